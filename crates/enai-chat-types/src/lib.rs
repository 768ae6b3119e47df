//! Type definitions for the Enai embedded chat surface
//!
//! This crate provides the shared contract between the chat engine and the
//! native host wrapping it, ensuring type-safe communication across the
//! webview boundary. Centralizing the wire shapes here keeps the engine and
//! the host glue from drifting apart and makes protocol compliance a
//! compile-time property.
//!
//! ## Features
//!
//! - **Conversation model**: messages with a tagged content union covering
//!   plain text and embedded applet payloads
//! - **Bridge protocol**: the structured requests the client posts to the
//!   native host and the callbacks the host delivers back
//! - **Serde support**: every wire-facing type serializes to the exact JSON
//!   the host and backend expect
//!
//! ## Example
//!
//! ```rust
//! use enai_chat_types::{Message, MessageKind};
//!
//! let message = Message::prompt("Hello, how can you help me?");
//! assert_eq!(message.kind, MessageKind::Prompt);
//! assert!(!message.is_loading);
//! ```

pub mod bridge;
pub mod types;

pub use bridge::*;
pub use types::*;
