//! Conversation store
//!
//! The ordered, mutable list of messages, exclusively owned here. The
//! submission pipeline mutates it only through the operations below, and
//! every mutation pushes a fresh snapshot to the display sink so the renderer
//! always sees cumulative state, never a regression.

use tokio::sync::Mutex;

use enai_chat_types::Message;

/// The renderer seam. Implemented by the webview glue in production; the
/// engine only ever hands it owned snapshots, so no further synchronization
/// is needed on the render side.
pub trait DisplaySink: Send + Sync {
    /// A new cumulative snapshot of the conversation.
    fn push(&self, messages: Vec<Message>);
    /// The conversation title resolved for the first exchange.
    fn set_title(&self, title: &str);
    /// Inspirational HTML shown while the conversation is empty.
    fn set_inspiration(&self, html: &str);
}

pub type DisplaySinkBox = Box<dyn DisplaySink>;

pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    sink: DisplaySinkBox,
}

impl ConversationStore {
    pub fn new(sink: DisplaySinkBox) -> ConversationStore {
        ConversationStore {
            messages: Mutex::new(vec![]),
            sink,
        }
    }

    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Appends messages, preserving id uniqueness. A message whose id is
    /// already present is skipped.
    pub async fn append(&self, messages: Vec<Message>) {
        let mut guard = self.messages.lock().await;
        for message in messages {
            if guard.iter().any(|existing| existing.id == message.id) {
                log::debug!("skipping append of duplicate message id {}", message.id);
                continue;
            }
            guard.push(message);
        }
        self.sink.push(guard.clone());
    }

    pub async fn replace_all(&self, messages: Vec<Message>) {
        let mut guard = self.messages.lock().await;
        *guard = messages;
        self.sink.push(guard.clone());
    }

    /// Mutates the message with the given id. A missing id is a no-op, not
    /// an error: it signals the conversation was reset or superseded by a
    /// later submission.
    pub async fn update_by_id<F>(&self, id: &str, mutate: F)
    where
        F: FnOnce(&mut Message),
    {
        let mut guard = self.messages.lock().await;
        match guard.iter_mut().find(|message| message.id == id) {
            Some(message) => {
                mutate(message);
                self.sink.push(guard.clone());
            }
            None => {
                log::debug!("update for unknown message id {id}, conversation was superseded");
            }
        }
    }

    pub fn set_title(&self, title: &str) {
        self.sink.set_title(title);
    }

    pub fn set_inspiration(&self, html: &str) {
        self.sink.set_inspiration(html);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct TestSink {
        pushes: StdMutex<Vec<Vec<Message>>>,
        titles: StdMutex<Vec<String>>,
    }

    impl DisplaySink for Arc<TestSink> {
        fn push(&self, messages: Vec<Message>) {
            self.pushes.lock().unwrap().push(messages);
        }

        fn set_title(&self, title: &str) {
            self.titles.lock().unwrap().push(title.to_string());
        }

        fn set_inspiration(&self, _html: &str) {}
    }

    fn store() -> (ConversationStore, Arc<TestSink>) {
        let sink = Arc::new(TestSink::default());
        (ConversationStore::new(Box::new(sink.clone())), sink)
    }

    #[tokio::test]
    async fn append_pushes_cumulative_snapshot() {
        let (store, sink) = store();

        store.append(vec![Message::prompt("hi")]).await;
        store.append(vec![Message::text("hello")]).await;

        let pushes = sink.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[0].len(), 1);
        assert_eq!(pushes[1].len(), 2);
    }

    #[tokio::test]
    async fn append_skips_duplicate_ids() {
        let (store, _sink) = store();
        let message = Message::prompt("hi");

        store.append(vec![message.clone()]).await;
        store.append(vec![message]).await;

        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn update_by_id_mutates_and_pushes() {
        let (store, sink) = store();
        let mut message = Message::pending_text();
        let id = message.id.clone();
        message.is_loading = true;
        store.append(vec![message]).await;

        store
            .update_by_id(&id, |message| message.is_loading = false)
            .await;

        let snapshot = store.snapshot().await;
        assert!(!snapshot[0].is_loading);
        assert_eq!(sink.pushes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_a_noop() {
        let (store, sink) = store();
        store.append(vec![Message::prompt("hi")]).await;

        store
            .update_by_id("missing", |message| message.is_loading = false)
            .await;

        // No extra push for the no-op.
        assert_eq!(sink.pushes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replace_all_swaps_contents() {
        let (store, _sink) = store();
        store.append(vec![Message::prompt("old")]).await;

        store
            .replace_all(vec![Message::prompt("a"), Message::text("b")])
            .await;

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].content.as_text(), Some("a"));
    }
}
