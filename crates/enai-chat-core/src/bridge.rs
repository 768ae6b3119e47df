//! Host bridge adapter
//!
//! The native host exposes a one-way, callback-based channel: the client
//! posts structured requests and the host invokes callbacks whenever it has
//! something to deliver. This module wraps that channel in a
//! request/response-shaped facade. The adapter keeps at most one pending
//! resolver per callback kind; callbacks with no waiter flow to the session's
//! event channel instead.
//!
//! The adapter itself never fails a request: if the host is unreachable or
//! never calls back, the caller's own timeout governs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};

use enai_chat_types::{BridgeRequest, CallbackKind, HostCallback, OutboundEnvelope};

use crate::errors::ChatError;

/// One-way transport to the native host. Implemented by the webview glue in
/// production and by capturing mocks in tests.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    async fn send(&self, envelope: OutboundEnvelope) -> Result<(), ChatError>;
}

pub type BridgeTransportBox = Box<dyn BridgeTransport>;

pub struct HostBridge {
    transport: BridgeTransportBox,
    pending: Mutex<HashMap<CallbackKind, oneshot::Sender<HostCallback>>>,
    events: Mutex<Option<mpsc::UnboundedSender<HostCallback>>>,
}

impl HostBridge {
    pub fn new(transport: BridgeTransportBox) -> HostBridge {
        HostBridge {
            transport,
            pending: Mutex::new(HashMap::new()),
            events: Mutex::new(None),
        }
    }

    /// Routes callbacks that no request is waiting for, such as model lists
    /// or restored history pushed by the host on its own schedule.
    pub async fn set_event_sender(&self, sender: mpsc::UnboundedSender<HostCallback>) {
        *self.events.lock().await = Some(sender);
    }

    /// Sends a request and registers a resolver for the callback kind that
    /// answers it. A second request for the same kind replaces the previous
    /// resolver, which then resolves as closed.
    pub async fn request(
        &self,
        request: BridgeRequest,
        answered_by: CallbackKind,
    ) -> Result<oneshot::Receiver<HostCallback>, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(answered_by, tx);
        self.transport.send(OutboundEnvelope::new(request)).await?;
        Ok(rx)
    }

    /// Sends a request that is answered, if at all, through the event
    /// channel rather than a dedicated resolver.
    pub async fn notify(&self, request: BridgeRequest) -> Result<(), ChatError> {
        self.transport.send(OutboundEnvelope::new(request)).await
    }

    /// Entry point for the host glue: delivers a callback to whoever is
    /// waiting for it.
    pub async fn deliver(&self, callback: HostCallback) {
        let kind = callback.kind();
        let callback = match self.pending.lock().await.remove(&kind) {
            Some(resolver) => match resolver.send(callback) {
                Ok(()) => return,
                // Waiter gave up (timed out); reroute to the event channel
                // so a late delivery is not lost.
                Err(callback) => {
                    log::debug!("resolver for {kind:?} was dropped, rerouting callback");
                    callback
                }
            },
            None => callback,
        };

        match &*self.events.lock().await {
            Some(events) => {
                if events.send(callback).is_err() {
                    log::debug!("event channel closed, dropping {kind:?} callback");
                }
            }
            None => {
                log::debug!("no waiter or event channel for {kind:?} callback, dropping it");
            }
        }
    }
}
