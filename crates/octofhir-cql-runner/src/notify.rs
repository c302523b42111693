//! Delivery of user-facing notices

use octofhir_cql_runner_diagnostics::{Notice, Severity};
use parking_lot::Mutex;

/// Receiver for notices raised while building and executing evaluations
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Error => log::error!("{}", notice.message),
            Severity::Warning => log::warn!("{}", notice.message),
            Severity::Info => log::info!("{}", notice.message),
        }
    }
}

/// Records every notice it receives
#[derive(Debug, Default)]
pub struct NoticeCollector {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notices received so far
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Drain the received notices
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Check whether a notice with the given severity and message was received
    pub fn contains(&self, severity: Severity, message: &str) -> bool {
        self.notices
            .lock()
            .iter()
            .any(|n| n.severity == severity && n.message == message)
    }

    pub fn is_empty(&self) -> bool {
        self.notices.lock().is_empty()
    }
}

impl Notifier for NoticeCollector {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
