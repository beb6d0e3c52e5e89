//! Session registry: at most one live session per port identifier.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::channel::ChannelFactory;
use crate::config::SessionDefaults;

use super::modem::{ModemSession, SessionError};

/// Registry mapping port identifiers to live sessions.
///
/// Connect and disconnect are serialized by an ops lock so two callers can
/// never race a port into two channels. The map lock is separate and held
/// only for lookups and mutations, never across an `open()` or `close()`.
pub struct SessionRegistry {
    /// Map of port identifier to live session
    sessions: RwLock<HashMap<String, Arc<ModemSession>>>,

    /// Serializes connect/disconnect
    ops: Mutex<()>,

    /// Channel source for new sessions
    factory: Arc<dyn ChannelFactory>,

    /// Defaults applied to every session
    defaults: SessionDefaults,
}

impl SessionRegistry {
    /// Create a new registry.
    pub fn new(factory: Arc<dyn ChannelFactory>, defaults: SessionDefaults) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            ops: Mutex::new(()),
            factory,
            defaults,
        })
    }

    /// Connect a port, or return the existing session unchanged.
    ///
    /// Idempotent: a second call for a registered port returns the same
    /// session without reopening the channel. On open/init failure the
    /// session is never registered.
    pub async fn connect(&self, port: &str) -> Result<Arc<ModemSession>, SessionError> {
        let _ops = self.ops.lock().await;

        if let Some(existing) = self.sessions.read().await.get(port) {
            debug!(port, "session already connected");
            return Ok(existing.clone());
        }

        let session = ModemSession::new(port, self.defaults.clone());
        session.open(self.factory.as_ref()).await?;

        self.sessions
            .write()
            .await
            .insert(port.to_string(), session.clone());

        info!(port, "session registered");
        Ok(session)
    }

    /// Disconnect a port. No-op when no session is registered.
    ///
    /// The session is closed before it is removed, so the port can be
    /// reconnected immediately after this returns.
    pub async fn disconnect(&self, port: &str) {
        let _ops = self.ops.lock().await;

        let session = self.sessions.read().await.get(port).cloned();
        let Some(session) = session else {
            debug!(port, "no session to disconnect");
            return;
        };

        session.close().await;
        self.sessions.write().await.remove(port);

        info!(port, "session unregistered");
    }

    /// Look up a live session.
    pub async fn get(&self, port: &str) -> Option<Arc<ModemSession>> {
        self.sessions.read().await.get(port).cloned()
    }

    /// Point-in-time snapshot of connected ports.
    pub async fn list_sessions(&self) -> Vec<String> {
        let mut ports: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ports.sort();
        ports
    }

    /// Get the number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Disconnect every session (shutdown drain).
    pub async fn disconnect_all(&self) {
        for port in self.list_sessions().await {
            self.disconnect(&port).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannelFactory;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fast_defaults() -> SessionDefaults {
        SessionDefaults {
            read_timeout: ms(40),
            init_settle: ms(5),
            sms_mode_settle: ms(5),
            sms_address_settle: ms(5),
            ussd_charset_settle: ms(5),
            error_backoff: ms(10),
            close_grace: ms(10),
            ..SessionDefaults::default()
        }
    }

    fn test_registry() -> (Arc<SessionRegistry>, Arc<MockChannelFactory>) {
        let factory = Arc::new(MockChannelFactory::new());
        let registry = SessionRegistry::new(factory.clone(), fast_defaults());
        (registry, factory)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (registry, factory) = test_registry();

        let first = registry.connect("sim0").await.unwrap();
        let second = registry.connect("sim0").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.count().await, 1);

        // only one channel was ever opened
        assert!(factory.take_device("sim0").is_some());
        assert!(factory.take_device("sim0").is_none());

        registry.disconnect_all().await;
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_registered() {
        let (registry, factory) = test_registry();
        factory.fail_port("sim0");

        assert!(registry.connect("sim0").await.is_err());
        assert_eq!(registry.count().await, 0);
        assert!(registry.get("sim0").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_unknown_port_is_noop() {
        let (registry, _factory) = test_registry();
        registry.disconnect("sim9").await;
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_disconnect_then_reconnect_yields_fresh_session() {
        let (registry, factory) = test_registry();

        let first = registry.connect("sim0").await.unwrap();
        let mut device = factory.take_device("sim0").unwrap();

        // leave a message in the first session's inbox
        use tokio::io::AsyncWriteExt;
        device
            .write_all(b"+CMT: \"+84901234567\"\r\nHello\r\n")
            .await
            .unwrap();
        tokio::time::sleep(ms(150)).await;
        assert_eq!(first.inbox().len(), 1);

        registry.disconnect("sim0").await;
        assert!(registry.get("sim0").await.is_none());

        // immediate reconnect succeeds and starts from a clean slate
        let second = registry.connect("sim0").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.inbox().is_empty());

        registry.disconnect_all().await;
    }

    #[tokio::test]
    async fn test_list_sessions_is_a_snapshot() {
        let (registry, _factory) = test_registry();

        registry.connect("sim1").await.unwrap();
        registry.connect("sim0").await.unwrap();

        let ports = registry.list_sessions().await;
        assert_eq!(ports, vec!["sim0".to_string(), "sim1".to_string()]);

        registry.disconnect_all().await;
        assert!(registry.list_sessions().await.is_empty());
    }
}
