//! Authentication session manager
//!
//! Owns the [`AuthSession`] state and runs token acquisition against the host
//! bridge. The session is single-writer: only this manager mutates it, the
//! pipeline just reads and requests transitions.
//!
//! Concurrent callers that both need a fresh token are coalesced: the request
//! gate is held across the bridge round-trip, so the second caller blocks
//! until the first resolves and then finds the session active without posting
//! a duplicate token request.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;

use enai_chat_types::{
    AuthSession, BridgeRequest, CallbackKind, Credentials, HostCallback, TokenRequestKind,
};

use crate::bridge::HostBridge;
use crate::errors::ChatError;

pub struct AuthSessionManager {
    bridge: Arc<HostBridge>,
    state: Mutex<AuthSession>,
    request_gate: Mutex<()>,
    timeout: Duration,
}

impl AuthSessionManager {
    pub fn new(bridge: Arc<HostBridge>, timeout: Duration) -> AuthSessionManager {
        AuthSessionManager {
            bridge,
            state: Mutex::new(AuthSession::Unset),
            request_gate: Mutex::new(()),
            timeout,
        }
    }

    async fn active_credentials(&self) -> Option<Credentials> {
        self.state.lock().await.credentials().cloned()
    }

    /// Returns active credentials, acquiring fresh ones from the host when
    /// the session is unset or invalid. A timeout leaves the session state
    /// untouched.
    pub async fn ensure_active_session(&self) -> Result<Credentials, ChatError> {
        if let Some(credentials) = self.active_credentials().await {
            return Ok(credentials);
        }

        let _gate = self.request_gate.lock().await;

        // A coalesced caller finds the session already refreshed here.
        if let Some(credentials) = self.active_credentials().await {
            return Ok(credentials);
        }

        let sub_type = match *self.state.lock().await {
            AuthSession::Unset => TokenRequestKind::Initial,
            _ => TokenRequestKind::Refresh,
        };

        log::debug!("requesting {sub_type:?} token from host");
        let resolver = self
            .bridge
            .request(
                BridgeRequest::TokenRequest { sub_type },
                CallbackKind::Credentials,
            )
            .await?;

        match timeout(self.timeout, resolver).await {
            Ok(Ok(HostCallback::Credentials(credentials))) => {
                *self.state.lock().await = AuthSession::Active(credentials.clone());
                Ok(credentials)
            }
            Ok(Ok(_)) | Ok(Err(_)) => Err(ChatError::Bridge(
                "credentials resolver closed without a token".to_string(),
            )),
            Err(_) => {
                log::warn!(
                    "host did not answer the token request within {:?}",
                    self.timeout
                );
                Err(ChatError::AuthTimeout)
            }
        }
    }

    /// Marks the session invalid and clears credentials. The next
    /// `ensure_active_session` call posts a refresh token request.
    pub async fn invalidate(&self) {
        log::debug!("invalidating auth session");
        *self.state.lock().await = AuthSession::Invalid;
    }

    /// Adopts credentials the host pushed without a pending request.
    pub async fn adopt(&self, credentials: Credentials) {
        *self.state.lock().await = AuthSession::Active(credentials);
    }

    pub async fn session(&self) -> AuthSession {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeTransport;
    use async_trait::async_trait;
    use enai_chat_types::OutboundEnvelope;
    use tokio::sync::mpsc;

    struct ChannelTransport {
        tx: mpsc::UnboundedSender<OutboundEnvelope>,
    }

    #[async_trait]
    impl BridgeTransport for ChannelTransport {
        async fn send(&self, envelope: OutboundEnvelope) -> Result<(), ChatError> {
            let _ = self.tx.send(envelope);
            Ok(())
        }
    }

    fn harness() -> (
        Arc<HostBridge>,
        Arc<AuthSessionManager>,
        mpsc::UnboundedReceiver<OutboundEnvelope>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(HostBridge::new(Box::new(ChannelTransport { tx })));
        let auth = Arc::new(AuthSessionManager::new(
            bridge.clone(),
            Duration::from_millis(100),
        ));
        (bridge, auth, rx)
    }

    fn credentials(token: &str) -> Credentials {
        Credentials {
            user_id: "u1".to_string(),
            bearer_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn active_session_returns_without_host_round_trip() {
        let (_bridge, auth, mut rx) = harness();
        auth.adopt(credentials("t1")).await;

        let resolved = auth.ensure_active_session().await.unwrap();
        assert_eq!(resolved.bearer_token, "t1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn first_request_is_tagged_initial() {
        let (bridge, auth, mut rx) = harness();

        let host = tokio::spawn({
            let bridge = bridge.clone();
            async move {
                let envelope = rx.recv().await.unwrap();
                bridge
                    .deliver(HostCallback::Credentials(credentials("t1")))
                    .await;
                envelope
            }
        });

        let resolved = auth.ensure_active_session().await.unwrap();
        assert_eq!(resolved.bearer_token, "t1");

        let envelope = host.await.unwrap();
        assert_eq!(
            envelope.request,
            BridgeRequest::TokenRequest {
                sub_type: TokenRequestKind::Initial
            }
        );
    }

    #[tokio::test]
    async fn invalidated_session_requests_refresh() {
        let (bridge, auth, mut rx) = harness();
        auth.adopt(credentials("t1")).await;
        auth.invalidate().await;
        assert_eq!(auth.session().await, AuthSession::Invalid);

        let host = tokio::spawn({
            let bridge = bridge.clone();
            async move {
                let envelope = rx.recv().await.unwrap();
                bridge
                    .deliver(HostCallback::Credentials(credentials("t2")))
                    .await;
                envelope
            }
        });

        let resolved = auth.ensure_active_session().await.unwrap();
        assert_eq!(resolved.bearer_token, "t2");

        let envelope = host.await.unwrap();
        assert_eq!(
            envelope.request,
            BridgeRequest::TokenRequest {
                sub_type: TokenRequestKind::Refresh
            }
        );
    }

    #[tokio::test]
    async fn timeout_leaves_state_untouched() {
        let (_bridge, auth, _rx) = harness();

        let err = auth.ensure_active_session().await.unwrap_err();
        assert!(matches!(err, ChatError::AuthTimeout));
        assert_eq!(auth.session().await, AuthSession::Unset);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_token_request() {
        let (bridge, auth, mut rx) = harness();

        let host = tokio::spawn({
            let bridge = bridge.clone();
            async move {
                let first = rx.recv().await.unwrap();
                bridge
                    .deliver(HostCallback::Credentials(credentials("t1")))
                    .await;
                // Give a duplicate request time to surface if one was sent.
                tokio::time::sleep(Duration::from_millis(50)).await;
                let duplicate = rx.try_recv().ok();
                (first, duplicate)
            }
        });

        let (a, b) = tokio::join!(auth.ensure_active_session(), auth.ensure_active_session());
        assert_eq!(a.unwrap().bearer_token, "t1");
        assert_eq!(b.unwrap().bearer_token, "t1");

        let (first, duplicate) = host.await.unwrap();
        assert!(matches!(
            first.request,
            BridgeRequest::TokenRequest { .. }
        ));
        assert!(duplicate.is_none(), "a second token request was posted");
    }
}
