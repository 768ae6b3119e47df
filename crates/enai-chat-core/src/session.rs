//! Chat session façade
//!
//! Wires the engine together for an embedder: owns the conversation store,
//! auth manager and pipeline, pumps unsolicited host callbacks into session
//! state, and exposes the submit entry point. On startup it asks the host for
//! the prior conversation and for context sized to the selected model.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use enai_chat_types::{
    AiModel, BridgeRequest, Credentials, HistoryContent, HistoryMessage, HostCallback, Message,
    Role,
};

use crate::api::ApiClient;
use crate::auth::AuthSessionManager;
use crate::bridge::{BridgeTransportBox, HostBridge};
use crate::config::ChatConfig;
use crate::conversation::{ConversationStore, DisplaySinkBox};
use crate::errors::ChatError;
use crate::pipeline::{SubmissionPipeline, SubmissionRequest};

/// Selection used until the host supplies a model list.
fn default_model() -> AiModel {
    AiModel {
        id: "claude-3-5-sonnet".to_string(),
        name: "Claude 3.5 Sonnet".to_string(),
        description: "Anthropic's latest model.".to_string(),
        token_limit: 75000,
    }
}

pub struct ChatSession {
    bridge: Arc<HostBridge>,
    auth: Arc<AuthSessionManager>,
    store: Arc<ConversationStore>,
    pipeline: SubmissionPipeline,
    selected_model: Mutex<AiModel>,
    available_models: Mutex<Vec<AiModel>>,
    context: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<HostCallback>>>,
}

impl ChatSession {
    pub async fn new(
        config: ChatConfig,
        transport: BridgeTransportBox,
        sink: DisplaySinkBox,
    ) -> Arc<ChatSession> {
        let bridge = Arc::new(HostBridge::new(transport));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        bridge.set_event_sender(events_tx).await;

        let auth = Arc::new(AuthSessionManager::new(
            bridge.clone(),
            config.auth_timeout(),
        ));
        let store = Arc::new(ConversationStore::new(sink));
        let pipeline = SubmissionPipeline::new(
            ApiClient::new(&config),
            auth.clone(),
            store.clone(),
            &config,
        );

        Arc::new(ChatSession {
            bridge,
            auth,
            store,
            pipeline,
            selected_model: Mutex::new(default_model()),
            available_models: Mutex::new(vec![]),
            context: Mutex::new(vec![]),
            events: Mutex::new(Some(events_rx)),
        })
    }

    /// Spawns the callback pump and asks the host for the prior conversation
    /// and for context sized to the current model.
    pub async fn start(self: &Arc<Self>) -> Result<(), ChatError> {
        if let Some(mut events) = self.events.lock().await.take() {
            let session = self.clone();
            tokio::spawn(async move {
                while let Some(callback) = events.recv().await {
                    session.handle_callback(callback).await;
                }
            });
        }

        self.bridge.notify(BridgeRequest::RequestHistory).await?;
        self.request_context().await
    }

    async fn request_context(&self) -> Result<(), ChatError> {
        let token_limit = self.selected_model.lock().await.token_limit;
        self.bridge
            .notify(BridgeRequest::RequestContext { token_limit })
            .await
    }

    /// Applies a callback the host delivered outside any pending request.
    pub async fn handle_callback(&self, callback: HostCallback) {
        match callback {
            HostCallback::Credentials(credentials) => self.adopt_credentials(credentials).await,
            HostCallback::Models(models) => {
                let selected_id = self.selected_model.lock().await.id.clone();
                if let Some(model) = models.iter().find(|model| model.id == selected_id) {
                    *self.selected_model.lock().await = model.clone();
                }
                *self.available_models.lock().await = models;
            }
            HostCallback::Context(entries) => {
                *self.context.lock().await = entries;
            }
            HostCallback::History(history) => {
                let messages = history.iter().map(history_to_message).collect();
                self.store.replace_all(messages).await;
            }
            HostCallback::Inspiration(html) => {
                self.store.set_inspiration(&html);
            }
        }
    }

    async fn adopt_credentials(&self, credentials: Credentials) {
        self.auth.adopt(credentials).await;
    }

    /// Switches the selected model and re-requests context sized for it.
    /// Returns the adopted descriptor, or `None` for an unknown id.
    pub async fn select_model(&self, id: &str) -> Option<AiModel> {
        let model = self
            .available_models
            .lock()
            .await
            .iter()
            .find(|model| model.id == id)
            .cloned();

        match model {
            Some(model) => {
                *self.selected_model.lock().await = model.clone();
                if let Err(err) = self.request_context().await {
                    log::warn!("context refresh after model switch failed: {err}");
                }
                Some(model)
            }
            None => {
                log::warn!("ignoring selection of unknown model id {id}");
                None
            }
        }
    }

    /// Submits a prompt with the current model and context.
    pub async fn submit(&self, prompt: &str) -> Result<(), ChatError> {
        let request = SubmissionRequest {
            prompt: prompt.to_string(),
            model: self.selected_model.lock().await.clone(),
            context: self.context.lock().await.clone(),
        };
        self.pipeline.submit(request).await
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn auth(&self) -> &Arc<AuthSessionManager> {
        &self.auth
    }

    pub async fn selected_model(&self) -> AiModel {
        self.selected_model.lock().await.clone()
    }

    pub async fn available_models(&self) -> Vec<AiModel> {
        self.available_models.lock().await.clone()
    }
}

fn history_to_message(entry: &HistoryMessage) -> Message {
    match &entry.content {
        HistoryContent::Applet {
            applet_url,
            content,
        } => Message::applet(applet_url, content.clone()),
        HistoryContent::Text { text } => text_history_message(entry.role, text),
        HistoryContent::Plain(text) => text_history_message(entry.role, text),
    }
}

fn text_history_message(role: Role, text: &str) -> Message {
    match role {
        Role::User => Message::prompt(text),
        Role::Assistant => Message::text(text),
    }
}
