//! Wire messages exchanged with the native host over the webview bridge.

use serde::{Deserialize, Serialize};

use crate::types::{AiModel, Credentials, HistoryMessage};

/// Identifies this surface to the host message handler.
pub const BRIDGE_SOURCE: &str = "enai-agent";

/// Bridge protocol version.
pub const BRIDGE_VERSION: u32 = 1;

/// Which token issuance flow the host should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestKind {
    /// No token has been issued for this session yet.
    Initial,
    /// A previously issued token was rejected or lost.
    Refresh,
}

/// A structured request posted to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeRequest {
    /// Ask the host to issue bearer credentials.
    TokenRequest {
        /// Which issuance flow to run.
        sub_type: TokenRequestKind,
    },
    /// Ask the host for context strings sized for the selected model.
    RequestContext {
        /// Context window budget of the selected model.
        token_limit: u32,
    },
    /// Ask the host for the prior conversation.
    RequestHistory,
}

/// Envelope wrapping every client-to-host request with source and version
/// markers the host dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Always [`BRIDGE_SOURCE`].
    pub source: String,
    /// Always [`BRIDGE_VERSION`].
    pub version: u32,
    /// The request payload.
    #[serde(flatten)]
    pub request: BridgeRequest,
}

impl OutboundEnvelope {
    pub fn new(request: BridgeRequest) -> OutboundEnvelope {
        OutboundEnvelope {
            source: BRIDGE_SOURCE.to_string(),
            version: BRIDGE_VERSION,
            request,
        }
    }
}

/// A callback delivered by the host to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostCallback {
    /// Fresh bearer credentials.
    Credentials(Credentials),
    /// The models the user may select from.
    Models(Vec<AiModel>),
    /// Context strings to attach to submissions.
    Context(Vec<String>),
    /// The prior conversation.
    History(Vec<HistoryMessage>),
    /// Inspirational HTML shown while the conversation is empty.
    Inspiration(String),
}

/// Discriminant for [`HostCallback`], used to key pending resolvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Credentials,
    Models,
    Context,
    History,
    Inspiration,
}

impl HostCallback {
    /// The resolver slot this callback resolves.
    pub fn kind(&self) -> CallbackKind {
        match self {
            HostCallback::Credentials(_) => CallbackKind::Credentials,
            HostCallback::Models(_) => CallbackKind::Models,
            HostCallback::Context(_) => CallbackKind::Context,
            HostCallback::History(_) => CallbackKind::History,
            HostCallback::Inspiration(_) => CallbackKind::Inspiration,
        }
    }
}
