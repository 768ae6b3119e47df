//! Prompt submission pipeline
//!
//! The orchestrator behind every submission: sanitize the prompt, append the
//! placeholder pair, ensure an active auth session, stream the answer into
//! the pending response message, and drive the bounded auth-retry loop.
//!
//! The retry branch is an explicit loop rather than re-entrant recursion: the
//! retry counter is shared across the whole submission lineage, and each
//! iteration re-appends a fresh placeholder pair onto the pruned base
//! snapshot so failed attempts leave no duplicates behind.
//!
//! A newer submission cancels the in-flight one. Every store mutation that
//! originates from a network completion checks the attempt's cancellation
//! token first, so a superseded stream can never touch the conversation even
//! if its chunks arrive late.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use enai_chat_types::{AiModel, ExchangeMessage, Message, MessageContent, MessageKind, Role};

use crate::api::{ApiClient, ChatRequestBody, ContextEntry, Utf8StreamDecoder};
use crate::auth::AuthSessionManager;
use crate::config::ChatConfig;
use crate::conversation::ConversationStore;
use crate::errors::ChatError;

/// Shown in place of an answer when a submission fails terminally.
pub const ANSWER_FAILURE_TEXT: &str = "[Could not get answer. Please try again.]";

/// Strips leading and trailing newline runs from the raw prompt. Interior
/// whitespace is left alone. Idempotent.
pub fn sanitize_prompt(raw: &str) -> String {
    raw.trim_matches('\n').to_string()
}

/// One submission as handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub prompt: String,
    pub model: AiModel,
    pub context: Vec<String>,
}

pub struct SubmissionPipeline {
    api: ApiClient,
    auth: Arc<AuthSessionManager>,
    store: Arc<ConversationStore>,
    active: Mutex<Option<CancellationToken>>,
    max_retries: u32,
    max_context_messages: usize,
}

impl SubmissionPipeline {
    pub fn new(
        api: ApiClient,
        auth: Arc<AuthSessionManager>,
        store: Arc<ConversationStore>,
        config: &ChatConfig,
    ) -> SubmissionPipeline {
        SubmissionPipeline {
            api,
            auth,
            store,
            active: Mutex::new(None),
            max_retries: config.max_retries,
            max_context_messages: config.max_context_messages,
        }
    }

    /// Runs one submission to a terminal state. Returns `Ok` when the answer
    /// streamed to completion, `Err(Cancelled)` when a newer submission took
    /// over, and any other error after the failure text has been pushed.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<(), ChatError> {
        let cancel = self.begin_attempt().await;
        let question = sanitize_prompt(&request.prompt);
        log::debug!("submitting prompt ({} chars)", question.len());

        // Snapshot prior to this submission, loading flags cleared. Retries
        // re-append onto this, never onto a failed attempt's placeholders.
        let base: Vec<Message> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .map(|mut message| {
                message.is_loading = false;
                message
            })
            .collect();

        let mut retries = 0u32;
        loop {
            let prompt_message = Message::prompt(&question);
            let response_message = Message::pending_text();
            let response_id = response_message.id.clone();

            let mut working = base.clone();
            working.push(prompt_message);
            working.push(response_message);

            if cancel.is_cancelled() {
                return Err(ChatError::Cancelled);
            }
            self.store.replace_all(working).await;

            match self
                .run_attempt(&question, &request, &base, &response_id, &cancel)
                .await
            {
                Ok(()) => return Ok(()),
                Err(ChatError::Cancelled) => return Err(ChatError::Cancelled),
                Err(err @ (ChatError::Unauthorized | ChatError::AuthTimeout))
                    if retries < self.max_retries =>
                {
                    retries += 1;
                    log::debug!(
                        "auth failure ({err}), retrying submission {retries}/{}",
                        self.max_retries
                    );
                    self.auth.invalidate().await;
                }
                Err(err) => {
                    log::error!("submission failed: {err}");
                    if !cancel.is_cancelled() {
                        self.store
                            .update_by_id(&response_id, |message| {
                                message.is_loading = false;
                                message.content = MessageContent::Text {
                                    text: ANSWER_FAILURE_TEXT.to_string(),
                                };
                            })
                            .await;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Cancels the in-flight attempt, if any, and installs a fresh token.
    async fn begin_attempt(&self) -> CancellationToken {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            log::debug!("cancelling in-flight submission");
            previous.cancel();
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        token
    }

    async fn run_attempt(
        &self,
        question: &str,
        request: &SubmissionRequest,
        base: &[Message],
        response_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError> {
        let credentials = tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            resolved = self.auth.ensure_active_session() => resolved?,
        };

        // Only the first exchange of a conversation gets a title. Failures
        // here are swallowed, except a 401 which feeds the retry branch.
        if base.len() <= 1 {
            let title = tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                fetched = self.api.fetch_title(&credentials, question) => fetched,
            };
            match title {
                Ok(title) if !title.is_empty() => self.store.set_title(&title),
                Ok(_) => {}
                Err(ChatError::Unauthorized) => return Err(ChatError::Unauthorized),
                Err(err) => log::warn!("title fetch failed, continuing without one: {err}"),
            }
        }

        let body = ChatRequestBody {
            question: question.to_string(),
            model_id: request.model.id.clone(),
            context: request
                .context
                .iter()
                .map(|content| ContextEntry::website(content))
                .collect(),
            messages: exchange_history(base, self.max_context_messages),
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            sent = self.api.stream_chat(&credentials, &body) => sent?,
        };

        let mut stream = response.bytes_stream();
        let mut decoder = Utf8StreamDecoder::default();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    let piece = decoder.decode(&bytes);
                    self.append_to_response(response_id, &piece, cancel).await?;
                }
                Some(Err(err)) => return Err(ChatError::Transport(err.to_string())),
                None => break,
            }
        }
        let tail = decoder.finish();
        self.append_to_response(response_id, &tail, cancel).await?;

        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        self.store
            .update_by_id(response_id, |message| message.is_loading = false)
            .await;
        Ok(())
    }

    async fn append_to_response(
        &self,
        response_id: &str,
        piece: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ChatError> {
        if piece.is_empty() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        self.store
            .update_by_id(response_id, |message| {
                if let MessageContent::Text { text } = &mut message.content {
                    text.push_str(piece);
                }
            })
            .await;
        Ok(())
    }
}

/// Maps prior conversation messages onto the backend wire roles. Applet
/// payloads are serialized into the flat content string.
fn exchange_history(messages: &[Message], cap: usize) -> Vec<ExchangeMessage> {
    let start = messages.len().saturating_sub(cap);
    messages[start..]
        .iter()
        .map(|message| ExchangeMessage {
            role: match message.kind {
                MessageKind::Prompt => Role::User,
                _ => Role::Assistant,
            },
            content: match &message.content {
                MessageContent::Text { text } => text.clone(),
                applet @ MessageContent::Applet { .. } => {
                    serde_json::to_string(applet).unwrap_or_default()
                }
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_strips_newline_runs_only() {
        assert_eq!(sanitize_prompt("\n\nHi\n"), "Hi");
        assert_eq!(sanitize_prompt("Hi"), "Hi");
        assert_eq!(sanitize_prompt("  spaced  "), "  spaced  ");
        assert_eq!(sanitize_prompt("a\nb"), "a\nb");
        assert_eq!(sanitize_prompt("\n\n\n"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["\nHi there\n\n", "Hi", "", "\n", "a\n\nb"] {
            let once = sanitize_prompt(raw);
            assert_eq!(sanitize_prompt(&once), once);
        }
    }

    #[test]
    fn exchange_history_maps_prompt_to_user() {
        let messages = vec![Message::prompt("question"), Message::text("answer")];

        let exchange = exchange_history(&messages, 20);
        assert_eq!(exchange.len(), 2);
        assert_eq!(exchange[0].role, Role::User);
        assert_eq!(exchange[0].content, "question");
        assert_eq!(exchange[1].role, Role::Assistant);
    }

    #[test]
    fn exchange_history_serializes_applets_as_assistant() {
        let messages = vec![Message::applet("https://a", json!({"k": 1}))];

        let exchange = exchange_history(&messages, 20);
        assert_eq!(exchange[0].role, Role::Assistant);
        assert!(exchange[0].content.contains("resourceUrl"));
    }

    #[test]
    fn exchange_history_caps_at_most_recent_messages() {
        let messages: Vec<Message> = (0..30)
            .map(|i| Message::prompt(&format!("m{i}")))
            .collect();

        let exchange = exchange_history(&messages, 20);
        assert_eq!(exchange.len(), 20);
        assert_eq!(exchange[0].content, "m10");
        assert_eq!(exchange[19].content, "m29");
    }
}
