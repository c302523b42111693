//! Connection and context management commands

use super::GlobalConfig;
use super::output;
use crate::connection::{Connection, ConnectionStore, Context, LOCAL_CONNECTION};
use anyhow::{Context as _, Result};

/// A change to the connection store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    List,
    Add { name: String, endpoint: String },
    Remove { name: String },
    Use { name: String },
    /// Unset the current connection
    Clear,
    AddContext {
        connection: String,
        resource_type: String,
        resource_id: String,
        display: Option<String>,
    },
    RemoveContext { connection: String, key: String },
}

/// Apply an action to the store; returns the message to report, if any
pub fn apply(store: &mut ConnectionStore, action: ConnectionAction) -> Result<Option<String>> {
    let message = match action {
        ConnectionAction::List => None,
        ConnectionAction::Add { name, endpoint } => {
            let replaced = store.connection(&name).is_some();
            let connection = match store.connection(&name) {
                Some(existing) => Connection {
                    endpoint: endpoint.clone(),
                    ..existing.clone()
                },
                None => Connection::new(&name, &endpoint),
            };
            store.upsert_connection(connection);
            Some(if replaced {
                format!("Updated connection {} ({})", name, endpoint)
            } else {
                format!("Added connection {} ({})", name, endpoint)
            })
        }
        ConnectionAction::Remove { name } => {
            if store.connection(&name).is_none() {
                anyhow::bail!("Connection '{}' does not exist", name);
            }
            store.delete_connection(&name);
            Some(format!("Removed connection {}", name))
        }
        ConnectionAction::Use { name } => {
            if store.connection(&name).is_none() {
                if name != LOCAL_CONNECTION {
                    anyhow::bail!("Connection '{}' does not exist", name);
                }
                store.upsert_connection(Connection::local(""));
            }
            store.set_current_connection(Some(&name));
            Some(format!("Current connection is {}", name))
        }
        ConnectionAction::Clear => {
            store.set_current_connection(None);
            Some("No connection is current".to_string())
        }
        ConnectionAction::AddContext {
            connection,
            resource_type,
            resource_id,
            display,
        } => {
            let mut context = Context::new(resource_type, resource_id);
            if let Some(display) = display {
                context = context.with_display(display);
            }
            let key = context.key();
            store.upsert_context(&connection, context)?;
            Some(format!("Added context {} to {}", key, connection))
        }
        ConnectionAction::RemoveContext { connection, key } => {
            store.delete_context(&connection, &key);
            Some(format!("Removed context {} from {}", key, connection))
        }
    };
    Ok(message)
}

/// Load the store, apply the action and persist the result
pub fn run(global: &GlobalConfig, action: ConnectionAction) -> Result<()> {
    let (mut store, storage) = global.load_store()?;
    let persist = action != ConnectionAction::List;

    let message = apply(&mut store, action)?;
    if persist {
        store.save(&storage).with_context(|| {
            format!("Failed to save connections to {}", storage.path().display())
        })?;
    }

    if let Some(message) = message {
        eprintln!("{}", output::format_success(&message));
    }
    println!("{}", output::format_connections(&store));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_keeps_contexts() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(
            Connection::new("Remote", "http://old").with_context(Context::patient("p1")),
        );

        apply(
            &mut store,
            ConnectionAction::Add {
                name: "Remote".to_string(),
                endpoint: "http://new".to_string(),
            },
        )
        .unwrap();

        let remote = store.connection("Remote").unwrap();
        assert_eq!(remote.endpoint, "http://new");
        assert!(remote.contexts.contains_key("Patient/p1"));
    }

    #[test]
    fn test_use_unknown_connection() {
        let mut store = ConnectionStore::new();
        let result = apply(&mut store, ConnectionAction::Use { name: "Remote".to_string() });
        assert!(result.is_err());

        apply(&mut store, ConnectionAction::Use { name: LOCAL_CONNECTION.to_string() }).unwrap();
        assert!(store.current_connection().is_some_and(Connection::is_local));
    }

    #[test]
    fn test_context_actions() {
        let mut store = ConnectionStore::new();
        store.upsert_connection(Connection::new("Remote", "http://localhost:8000"));

        apply(
            &mut store,
            ConnectionAction::AddContext {
                connection: "Remote".to_string(),
                resource_type: "Patient".to_string(),
                resource_id: "simple-test".to_string(),
                display: Some("Simple".to_string()),
            },
        )
        .unwrap();
        assert_eq!(store.connection("Remote").unwrap().contexts.len(), 1);

        apply(
            &mut store,
            ConnectionAction::RemoveContext {
                connection: "Remote".to_string(),
                key: "Patient/simple-test".to_string(),
            },
        )
        .unwrap();
        assert!(store.connection("Remote").unwrap().contexts.is_empty());

        let missing = apply(
            &mut store,
            ConnectionAction::AddContext {
                connection: "Missing".to_string(),
                resource_type: "Patient".to_string(),
                resource_id: "p1".to_string(),
                display: None,
            },
        );
        assert!(missing.is_err());
    }
}
