//! Named data connections
//!
//! A connection is a source of model data for evaluation: either the local
//! test data tree of the project or a remote FHIR endpoint. Each connection
//! carries the contexts (resource type + id) to evaluate against. Exactly one
//! connection may be current at a time.
//!
//! The store itself is a plain in-memory structure. Persistence goes through
//! a [`ConnectionStorage`] key-value backend under two fixed keys.

use indexmap::IndexMap;
use octofhir_cql_runner_diagnostics::{CQLR0101, CQLR0102, Result, RunnerError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the reserved connection backed by the project's test data
pub const LOCAL_CONNECTION: &str = "Local";

/// Storage key holding all connections
pub const CONNECTIONS_KEY: &str = "connections";

/// Storage key holding the current connection
pub const CURRENT_CONNECTION_KEY: &str = "currentConnection";

/// A single resource to evaluate against, e.g. one patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(rename = "resourceID")]
    pub resource_id: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_display: Option<String>,
}

impl Context {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            resource_display: None,
        }
    }

    /// A `Patient` context
    pub fn patient(resource_id: impl Into<String>) -> Self {
        Self::new("Patient", resource_id)
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.resource_display = Some(display.into());
        self
    }

    /// Key of this context within its connection: `<resourceType>/<resourceID>`
    pub fn key(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_id)
    }
}

/// A named source of model data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub contexts: IndexMap<String, Context>,
}

impl Connection {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            contexts: IndexMap::new(),
        }
    }

    /// The reserved local connection
    pub fn local(endpoint: impl Into<String>) -> Self {
        Self::new(LOCAL_CONNECTION, endpoint)
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.contexts.insert(context.key(), context);
        self
    }

    pub fn is_local(&self) -> bool {
        self.name == LOCAL_CONNECTION
    }

    pub fn reference(&self) -> ConnectionRef {
        ConnectionRef::from_name(&self.name)
    }
}

/// Reference to a connection, with the reserved local connection made explicit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionRef {
    Local,
    Named(String),
}

impl ConnectionRef {
    pub fn from_name(name: &str) -> Self {
        if name == LOCAL_CONNECTION {
            Self::Local
        } else {
            Self::Named(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Local => LOCAL_CONNECTION,
            Self::Named(name) => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Key-value persistence used to save and restore the store across sessions
pub trait ConnectionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn update(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory storage, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn update(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Storage backed by a single JSON object file
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| RunnerError::io(CQLR0101, "Failed to read state file", &self.path, e))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(RunnerError::storage(CQLR0102, "State file is not a JSON object")
                .with_context(self.path.display().to_string())),
            Err(e) => Err(RunnerError::storage(CQLR0102, format!("Invalid state file: {}", e))
                .with_context(self.path.display().to_string())),
        }
    }
}

impl ConnectionStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn update(&self, key: &str, value: Value) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RunnerError::io(CQLR0101, "Failed to create state directory", parent, e)
            })?;
        }

        let content = serde_json::to_string_pretty(&Value::Object(all))
            .map_err(|e| RunnerError::storage(CQLR0101, e.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|e| RunnerError::io(CQLR0101, "Failed to write state file", &self.path, e))
    }
}

/// Registry of named connections with at most one current connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStore {
    connections: IndexMap<String, Connection>,
    current: Option<String>,
}

impl ConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding only the local connection, selected as current
    pub fn with_local(endpoint: impl Into<String>) -> Self {
        let mut store = Self::new();
        store.upsert_connection(Connection::local(endpoint));
        store.set_current_connection(Some(LOCAL_CONNECTION));
        store
    }

    /// Restore a store from persistent storage
    ///
    /// Absent keys yield an empty store. Malformed stored values are logged
    /// and ignored; only storage failures are returned as errors.
    pub fn load(storage: &dyn ConnectionStorage) -> Result<Self> {
        let mut store = Self::new();

        if let Some(value) = storage.get(CONNECTIONS_KEY)? {
            match serde_json::from_value::<IndexMap<String, Connection>>(value) {
                Ok(connections) => store.connections = connections,
                Err(e) => log::warn!("Ignoring malformed stored connections: {}", e),
            }
        }

        // Older state stored the whole connection object rather than its name
        let current = match storage.get(CURRENT_CONNECTION_KEY)? {
            Some(Value::String(name)) => Some(name),
            Some(Value::Object(obj)) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        store.set_current_connection(current.as_deref());

        log::debug!(
            "Loaded {} connection(s), current: {:?}",
            store.connections.len(),
            store.current
        );
        Ok(store)
    }

    /// Persist all connections and the current connection name
    pub fn save(&self, storage: &dyn ConnectionStorage) -> Result<()> {
        let connections = serde_json::to_value(&self.connections)
            .map_err(|e| RunnerError::storage(CQLR0101, e.to_string()))?;
        storage.update(CONNECTIONS_KEY, connections)?;

        let current = self
            .current
            .as_ref()
            .map(|name| Value::String(name.clone()))
            .unwrap_or(Value::Null);
        storage.update(CURRENT_CONNECTION_KEY, current)
    }

    pub fn all_connections(&self) -> &IndexMap<String, Connection> {
        &self.connections
    }

    pub fn connection(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    pub fn current_connection(&self) -> Option<&Connection> {
        self.current.as_ref().and_then(|name| self.connections.get(name))
    }

    pub fn current_ref(&self) -> Option<ConnectionRef> {
        self.current_connection().map(Connection::reference)
    }

    /// Contexts of the current connection, `None` when no connection is current
    pub fn current_contexts(&self) -> Option<&IndexMap<String, Context>> {
        self.current_connection().map(|c| &c.contexts)
    }

    /// Select the current connection; `None` or an unknown name leaves it unset
    pub fn set_current_connection(&mut self, name: Option<&str>) {
        self.current = name
            .filter(|name| self.connections.contains_key(*name))
            .map(str::to_string);
    }

    /// Insert or replace a connection by name
    pub fn upsert_connection(&mut self, connection: Connection) {
        self.connections.insert(connection.name.clone(), connection);
    }

    /// Remove a connection; removing the current connection leaves current unset
    pub fn delete_connection(&mut self, name: &str) {
        if self.connections.shift_remove(name).is_some() && self.current.as_deref() == Some(name) {
            self.current = None;
        }
    }

    /// Insert or replace a context under `<resourceType>/<resourceID>`
    pub fn upsert_context(&mut self, connection_name: &str, context: Context) -> Result<()> {
        let connection = self
            .connections
            .get_mut(connection_name)
            .ok_or_else(|| RunnerError::connection_not_found(connection_name))?;
        connection.contexts.insert(context.key(), context);
        Ok(())
    }

    /// Remove a context by key; unknown connections or keys are ignored
    pub fn delete_context(&mut self, connection_name: &str, context_id: &str) {
        if let Some(connection) = self.connections.get_mut(connection_name) {
            connection.contexts.shift_remove(context_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn remote() -> Connection {
        Connection::new("Remote", "http://localhost:8000")
    }

    #[test]
    fn test_upsert_and_set_current() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(remote());
        store.set_current_connection(Some("Remote"));

        assert_eq!(store.current_connection().map(|c| c.name.as_str()), Some("Remote"));
        assert_eq!(store.current_ref(), Some(ConnectionRef::Named("Remote".into())));

        // Overwrite keeps current and replaces the endpoint
        store.upsert_connection(Connection::new("Remote", "http://localhost:9000"));
        assert_eq!(
            store.current_connection().map(|c| c.endpoint.as_str()),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn test_set_current_unknown_or_none() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(remote());
        store.set_current_connection(Some("Remote"));

        store.set_current_connection(Some("Missing"));
        assert!(store.current_connection().is_none());
        assert!(store.current_contexts().is_none());

        store.set_current_connection(Some("Remote"));
        store.set_current_connection(None);
        assert!(store.current_connection().is_none());
    }

    #[test]
    fn test_delete_current_connection_unsets_current() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(remote());
        store.set_current_connection(Some("Remote"));

        store.delete_connection("Remote");
        assert!(store.current_connection().is_none());
        assert!(store.all_connections().is_empty());

        // No-op on absent names
        store.delete_connection("Remote");
    }

    #[test]
    fn test_context_crud() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(remote());
        store.set_current_connection(Some("Remote"));

        store
            .upsert_context("Remote", Context::patient("123").with_display("John Doe"))
            .unwrap();
        store.upsert_context("Remote", Context::patient("456")).unwrap();
        store.upsert_context("Remote", Context::patient("123")).unwrap();

        let contexts = store.current_contexts().unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts["Patient/123"].resource_display, None);

        store.delete_context("Remote", "Patient/123");
        store.delete_context("Remote", "Patient/999");
        store.delete_context("Missing", "Patient/456");
        let keys: Vec<_> = store.current_contexts().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Patient/456".to_string()]);
    }

    #[test]
    fn test_upsert_context_unknown_connection() {
        let mut store = ConnectionStore::new();
        let err = store.upsert_context("Missing", Context::patient("1")).unwrap_err();
        assert!(matches!(err, RunnerError::NotFound { .. }));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let storage = MemoryStorage::new();
        let mut store = ConnectionStore::with_local("file:///project/input/tests");
        store.upsert_connection(remote().with_context(Context::patient("simple-test")));
        store.set_current_connection(Some("Remote"));
        store.save(&storage).unwrap();

        assert_eq!(
            storage.get(CURRENT_CONNECTION_KEY).unwrap(),
            Some(json!("Remote"))
        );
        let restored = ConnectionStore::load(&storage).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_load_legacy_and_malformed_state() {
        let storage = MemoryStorage::new();
        storage
            .update(
                CONNECTIONS_KEY,
                json!({
                    "Remote": {
                        "name": "Remote",
                        "endpoint": "http://localhost:8000",
                        "contexts": {
                            "Patient/1": { "resourceID": "1", "resourceType": "Patient" }
                        }
                    }
                }),
            )
            .unwrap();
        storage
            .update(
                CURRENT_CONNECTION_KEY,
                json!({ "name": "Remote", "endpoint": "x", "contexts": {} }),
            )
            .unwrap();

        let store = ConnectionStore::load(&storage).unwrap();
        assert_eq!(store.current_ref(), Some(ConnectionRef::Named("Remote".into())));
        assert_eq!(store.current_contexts().unwrap().len(), 1);

        storage.update(CONNECTIONS_KEY, json!([1, 2, 3])).unwrap();
        let store = ConnectionStore::load(&storage).unwrap();
        assert!(store.all_connections().is_empty());
        assert!(store.current_connection().is_none());
    }

    #[test]
    fn test_json_file_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(temp_dir.path().join("state").join("state.json"));

        assert_eq!(storage.get(CONNECTIONS_KEY).unwrap(), None);

        let mut store = ConnectionStore::new();
        store.upsert_connection(remote());
        store.save(&storage).unwrap();

        let restored = ConnectionStore::load(&storage).unwrap();
        assert!(restored.connection("Remote").is_some());
        assert!(restored.current_connection().is_none());

        fs::write(storage.path(), "not json").unwrap();
        assert!(matches!(
            storage.get(CONNECTIONS_KEY),
            Err(RunnerError::Storage { .. })
        ));
    }

    #[test]
    fn test_connection_ref() {
        assert!(ConnectionRef::from_name("Local").is_local());
        assert_eq!(ConnectionRef::from_name("Remote").name(), "Remote");
        assert!(Connection::local("file:///tmp").is_local());
    }
}
