//! Instance registry.
//!
//! Holds one [`InstanceConfig`] per configured prefix and lazily opens one
//! connection per `(instance, database)` slot. Each instance's slots sit
//! behind a single async mutex; a [`ConnectionLease`] keeps that mutex for
//! as long as a statement is using the connection.

use crate::db::connection::{Connector, DbConnection};
use crate::error::{DbError, DbResult};
use crate::models::InstanceConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

type SlotKey = Option<String>;
type Slots = HashMap<SlotKey, Box<dyn DbConnection>>;

struct InstanceEntry {
    config: Arc<InstanceConfig>,
    slots: Arc<Mutex<Slots>>,
}

/// Registry of configured instances and their cached connections.
pub struct Registry {
    instances: HashMap<String, InstanceEntry>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefixes: Vec<&String> = self.instances.keys().collect();
        prefixes.sort();
        f.debug_struct("Registry")
            .field("instances", &prefixes)
            .finish()
    }
}

impl Registry {
    /// Build a registry. Prefixes must be unique.
    pub fn new(configs: Vec<InstanceConfig>, connector: Arc<dyn Connector>) -> DbResult<Self> {
        let mut instances = HashMap::with_capacity(configs.len());
        for config in configs {
            let prefix = config.prefix.clone();
            let entry = InstanceEntry {
                config: Arc::new(config),
                slots: Arc::new(Mutex::new(HashMap::new())),
            };
            if instances.insert(prefix.clone(), entry).is_some() {
                return Err(DbError::internal(format!(
                    "Instance prefix '{}' is configured more than once",
                    prefix
                )));
            }
        }
        Ok(Self {
            instances,
            connector,
        })
    }

    /// Look up an instance by prefix.
    pub fn resolve(&self, prefix: &str) -> DbResult<Arc<InstanceConfig>> {
        self.entry(prefix).map(|e| e.config.clone())
    }

    /// All configured instances, ordered by prefix.
    pub fn instances(&self) -> Vec<Arc<InstanceConfig>> {
        let mut configs: Vec<_> = self.instances.values().map(|e| e.config.clone()).collect();
        configs.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        configs
    }

    fn entry(&self, prefix: &str) -> DbResult<&InstanceEntry> {
        self.instances
            .get(prefix)
            .ok_or_else(|| DbError::unknown_instance(prefix))
    }

    /// Lease the connection for `database` on an instance.
    ///
    /// A cached connection is pinged first. A dead one is closed and a
    /// single reconnect is attempted; a failed connect is returned as-is.
    pub async fn connection_for(
        &self,
        prefix: &str,
        database: Option<&str>,
    ) -> DbResult<ConnectionLease> {
        let entry = self.entry(prefix)?;
        let key: SlotKey = entry
            .config
            .effective_database(database)
            .map(str::to_string);

        let mut slots = entry.slots.clone().lock_owned().await;

        if let Some(mut conn) = slots.remove(&key) {
            match conn.ping().await {
                Ok(()) => {
                    debug!(prefix, database = ?key, "Reusing cached connection");
                    return Ok(ConnectionLease::new(slots, key, conn));
                }
                Err(e) => {
                    warn!(prefix, database = ?key, error = %e, "Cached connection is dead, reconnecting");
                    conn.close().await;
                }
            }
        }

        let conn = self.connector.connect(&entry.config, key.as_deref()).await?;
        info!(prefix, database = ?key, "Connection opened");
        Ok(ConnectionLease::new(slots, key, conn))
    }

    /// Close every cached connection.
    pub async fn close_all(&self) {
        for (prefix, entry) in &self.instances {
            let mut slots = entry.slots.lock().await;
            for (key, mut conn) in slots.drain() {
                debug!(prefix = %prefix, database = ?key, "Closing connection");
                conn.close().await;
            }
        }
    }
}

/// Exclusive use of one cached connection.
///
/// Dropping the lease puts the connection back into its slot and releases
/// the instance lock. A discarded connection is not put back.
pub struct ConnectionLease {
    slots: OwnedMutexGuard<Slots>,
    key: SlotKey,
    conn: Option<Box<dyn DbConnection>>,
}

impl ConnectionLease {
    fn new(slots: OwnedMutexGuard<Slots>, key: SlotKey, conn: Box<dyn DbConnection>) -> Self {
        Self {
            slots,
            key,
            conn: Some(conn),
        }
    }

    /// Database this lease is connected to, if the instance names one.
    pub fn database(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn connection(&mut self) -> DbResult<&mut dyn DbConnection> {
        match self.conn.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(DbError::internal("Connection was discarded")),
        }
    }

    /// Drop the connection instead of returning it to the cache.
    pub fn discard(&mut self) {
        if self.conn.take().is_some() {
            warn!(database = ?self.key, "Discarding connection in unknown state");
        }
    }

    /// Close cached connections to `database` held by the same instance.
    pub async fn evict(&mut self, database: &str) {
        let stale: Vec<SlotKey> = self
            .slots
            .keys()
            .filter(|k| k.as_deref() == Some(database))
            .cloned()
            .collect();
        for key in stale {
            if let Some(mut conn) = self.slots.remove(&key) {
                info!(database, "Closing cached connection before drop");
                conn.close().await;
            }
        }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.slots.insert(self.key.clone(), conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatabaseType, QueryParam, RowSet};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyConnection {
        alive: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DbConnection for FlakyConnection {
        async fn ping(&mut self) -> DbResult<()> {
            if self.alive.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DbError::connection("socket closed", "reconnect"))
            }
        }

        async fn fetch(&mut self, _: &str, _: &[QueryParam], _: usize) -> DbResult<RowSet> {
            Ok(RowSet::default())
        }

        async fn execute(&mut self, _: &str, _: &[QueryParam]) -> DbResult<u64> {
            Ok(0)
        }

        async fn close(&mut self) {}
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        alive: Arc<AtomicBool>,
        databases: std::sync::Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(
            &self,
            _: &InstanceConfig,
            database: Option<&str>,
        ) -> DbResult<Box<dyn DbConnection>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.alive.store(true, Ordering::SeqCst);
            self.databases
                .lock()
                .unwrap()
                .push(database.map(str::to_string));
            Ok(Box::new(FlakyConnection {
                alive: self.alive.clone(),
            }))
        }
    }

    fn pg(prefix: &str) -> InstanceConfig {
        InstanceConfig::new(
            prefix,
            DatabaseType::PostgreSQL,
            format!("postgres://localhost/{}", prefix),
            Some(prefix.to_string()),
        )
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let connector = Arc::new(CountingConnector::default());
        let result = Registry::new(vec![pg("pi"), pg("pi")], connector);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_unknown_instance() {
        let registry = Registry::new(vec![pg("pi")], Arc::new(CountingConnector::default())).unwrap();
        assert!(registry.resolve("pi").is_ok());
        let err = registry.resolve("desktop").unwrap_err();
        assert!(matches!(err, DbError::UnknownInstance { .. }));
    }

    #[tokio::test]
    async fn test_connection_is_reused() {
        let connector = Arc::new(CountingConnector::default());
        let registry = Registry::new(vec![pg("pi")], connector.clone()).unwrap();

        drop(registry.connection_for("pi", None).await.unwrap());
        drop(registry.connection_for("pi", Some("pi")).await.unwrap());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        drop(registry.connection_for("pi", Some("postgres")).await.unwrap());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        assert_eq!(
            *connector.databases.lock().unwrap(),
            vec![Some("pi".to_string()), Some("postgres".to_string())]
        );
    }

    #[tokio::test]
    async fn test_dead_connection_reconnects_once() {
        let connector = Arc::new(CountingConnector::default());
        let registry = Registry::new(vec![pg("pi")], connector.clone()).unwrap();

        drop(registry.connection_for("pi", None).await.unwrap());
        connector.alive.store(false, Ordering::SeqCst);

        let mut lease = registry.connection_for("pi", None).await.unwrap();
        assert!(lease.connection().unwrap().ping().await.is_ok());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_discarded_connection_is_not_cached() {
        let connector = Arc::new(CountingConnector::default());
        let registry = Registry::new(vec![pg("pi")], connector.clone()).unwrap();

        let mut lease = registry.connection_for("pi", None).await.unwrap();
        lease.discard();
        assert!(lease.connection().is_err());
        drop(lease);

        drop(registry.connection_for("pi", None).await.unwrap());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evict_closes_target_database_only() {
        let connector = Arc::new(CountingConnector::default());
        let registry = Registry::new(vec![pg("pi")], connector.clone()).unwrap();

        drop(registry.connection_for("pi", Some("scratch")).await.unwrap());
        let mut lease = registry.connection_for("pi", Some("postgres")).await.unwrap();
        lease.evict("scratch").await;
        drop(lease);

        drop(registry.connection_for("pi", Some("postgres")).await.unwrap());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
        drop(registry.connection_for("pi", Some("scratch")).await.unwrap());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }
}
