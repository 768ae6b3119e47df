//! Backend HTTP client
//!
//! Two endpoints: a best-effort conversation title lookup and the streamed
//! chat answer. Both are scoped to the authenticated user id and carry the
//! bearer token. Status triage happens here; the pipeline decides what a 401
//! means for the submission lineage.

use reqwest::{Client, StatusCode};
use serde::Serialize;

use enai_chat_types::{Credentials, ExchangeMessage};

use crate::config::ChatConfig;
use crate::errors::ChatError;

/// A context entry attached to the chat request. Currently only website
/// snippets are forwarded by the host.
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    #[serde(rename = "type")]
    pub entry_type: String,
    pub content: String,
}

impl ContextEntry {
    pub fn website(content: &str) -> ContextEntry {
        ContextEntry {
            entry_type: "website".to_string(),
            content: content.to_string(),
        }
    }
}

/// JSON body of the chat request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequestBody {
    pub question: String,
    pub model_id: String,
    pub context: Vec<ContextEntry>,
    pub messages: Vec<ExchangeMessage>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    title_base_url: String,
    chat_base_url: String,
}

impl ApiClient {
    pub fn new(config: &ChatConfig) -> ApiClient {
        ApiClient {
            client: Client::new(),
            title_base_url: config.title_base_url(),
            chat_base_url: config.chat_base_url(),
        }
    }

    /// Fetches a short title for the conversation. The response may come
    /// back quoted; surrounding quotes are stripped before use.
    pub async fn fetch_title(
        &self,
        credentials: &Credentials,
        prompt: &str,
    ) -> Result<String, ChatError> {
        let url = format!(
            "{}/{}/title?prompt={}",
            self.title_base_url,
            credentials.user_id,
            urlencoding::encode(prompt)
        );
        log::debug!("fetching conversation title from {url}");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&credentials.bearer_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ChatError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(ChatError::Transport(format!(
                "title request failed with status {}",
                response.status()
            )));
        }

        let raw = response.text().await?;
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('"').unwrap_or(trimmed);
        Ok(trimmed.to_string())
    }

    /// Posts the prompt and returns the response whose body streams the
    /// answer as text chunks.
    pub async fn stream_chat(
        &self,
        credentials: &Credentials,
        body: &ChatRequestBody,
    ) -> Result<reqwest::Response, ChatError> {
        let url = format!("{}/{}/chat", self.chat_base_url, credentials.user_id);
        log::debug!(
            "submitting chat request to {url} with model {}",
            body.model_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&credentials.bearer_token)
            .json(body)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ChatError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(ChatError::Transport(format!(
                "chat request failed with status {}",
                response.status()
            )));
        }

        Ok(response)
    }
}

/// Incremental UTF-8 decoder for the answer stream. Chunk boundaries need
/// not align with character boundaries, so an incomplete trailing sequence is
/// carried over into the next call. Invalid bytes decode to the replacement
/// character.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    carry: Vec<u8>,
}

impl Utf8StreamDecoder {
    /// Decodes as much of the buffered bytes plus `chunk` as forms complete
    /// characters.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.carry.extend_from_slice(chunk);
        let buffered = std::mem::take(&mut self.carry);

        let mut out = String::new();
        let mut rest: &[u8] = &buffered;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete trailing sequence, wait for the
                            // next chunk.
                            self.carry = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes whatever is still buffered when the stream ends. A dangling
    /// partial sequence decodes to the replacement character.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.carry);
        if rest.is_empty() {
            String::new()
        } else {
            String::from_utf8_lossy(&rest).into_owned()
        }
    }
}
