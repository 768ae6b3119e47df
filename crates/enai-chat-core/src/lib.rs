//! Core engine for the Enai embedded chat surface.
//!
//! This crate implements the conversation and streaming machinery behind the
//! webview chat UI shipped inside the native app. The rendering layer and the
//! native host are collaborators behind two seams: a [`DisplaySink`] the
//! engine pushes conversation snapshots to, and a [`BridgeTransport`] it
//! posts host requests through.
//!
//! # Architecture Overview
//!
//! - **Auth session management**: token lifecycle against the host bridge,
//!   with coalesced acquisition and explicit invalidation
//! - **Host bridge adapter**: request/response facade over the host's
//!   one-way callback channel
//! - **Conversation store**: the ordered message list, pushed to the display
//!   sink on every mutation
//! - **Submission pipeline**: prompt sanitization, placeholder bookkeeping,
//!   streamed answer consumption, and the bounded auth-retry loop
//! - **Session façade**: startup wiring, host callback pump, model and
//!   context bookkeeping

pub mod api;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod pipeline;
pub mod session;

pub use api::ApiClient;
pub use auth::AuthSessionManager;
pub use bridge::{BridgeTransport, BridgeTransportBox, HostBridge};
pub use config::ChatConfig;
pub use conversation::{ConversationStore, DisplaySink, DisplaySinkBox};
pub use errors::ChatError;
pub use pipeline::{sanitize_prompt, SubmissionPipeline, SubmissionRequest, ANSWER_FAILURE_TEXT};
pub use session::ChatSession;
