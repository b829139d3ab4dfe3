//! Lazy ownership of the single control session of a device

use std::sync::Arc;

use remote_client::{RemoteError, RemoteSession, SessionConfig, SessionConnector};

/// Holds zero or one live session
///
/// Every path that replaces the handle drops the previous one first, so a
/// device never has two sessions open.
pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    config: SessionConfig,
    handle: Option<Box<dyn RemoteSession>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn SessionConnector>, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            handle: None,
        }
    }

    /// Live session, connecting first if there is none
    ///
    /// Connect failures are returned as-is and not retried here.
    pub fn session(&mut self) -> Result<&mut (dyn RemoteSession + 'static), RemoteError> {
        let session = match self.handle.take() {
            Some(session) => session,
            None => {
                tracing::debug!(
                    "Opening {:?} session to {}:{}",
                    self.config.method,
                    self.config.host,
                    self.config.port
                );
                self.connector.connect(&self.config)?
            }
        };
        Ok(&mut **self.handle.insert(session))
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Drop a session that is known to be dead without talking to it
    pub fn invalidate(&mut self) {
        if self.handle.take().is_some() {
            tracing::debug!("Dropped session to {}", self.config.host);
        }
    }

    /// Close gracefully; the handle is gone afterwards whatever happens
    pub fn close_session(&mut self) {
        if let Some(mut session) = self.handle.take() {
            if let Err(e) = session.close() {
                tracing::debug!("Could not close session to {}: {}", self.config.host, e);
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, Step};
    use remote_client::{Key, TransportMethod};
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig {
            name: "tv-remote".into(),
            description: "Test TV".into(),
            id: "tv-remote.controller".into(),
            host: "10.0.0.2".into(),
            port: 8001,
            timeout: Duration::from_secs(1),
            method: TransportMethod::Session,
        }
    }

    #[test]
    fn test_session_is_lazy_and_reused() {
        let connector = FakeConnector::new();
        let mut manager = SessionManager::new(connector.clone(), config());
        assert!(!manager.is_open());
        assert_eq!(connector.connects(), 0);

        manager.session().unwrap().send_key(&Key::Mute).unwrap();
        manager.session().unwrap().send_key(&Key::Mute).unwrap();

        assert_eq!(connector.connects(), 1);
        assert_eq!(connector.live(), 1);
    }

    #[test]
    fn test_connect_failure_propagates() {
        let connector = FakeConnector::new();
        connector.fail_connects(1);
        let mut manager = SessionManager::new(connector.clone(), config());

        assert!(manager.session().is_err());
        assert!(!manager.is_open());
        assert!(manager.session().is_ok());
    }

    #[test]
    fn test_close_swallows_errors_and_nulls() {
        let connector = FakeConnector::new();
        connector.script_close(Step::Closed);
        let mut manager = SessionManager::new(connector.clone(), config());
        manager.session().unwrap();

        manager.close_session();

        assert!(!manager.is_open());
        assert_eq!(connector.live(), 0);
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn test_invalidate_then_reconnect_keeps_one_live() {
        let connector = FakeConnector::new();
        let mut manager = SessionManager::new(connector.clone(), config());
        manager.session().unwrap();
        manager.invalidate();
        manager.session().unwrap();

        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.live(), 1);
        assert_eq!(connector.max_live(), 1);
    }
}
