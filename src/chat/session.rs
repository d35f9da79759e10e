//! Conversation session owned by the calling application

use super::error::ChatError;
use super::types::{ConversationHistory, Turn};
use super::ChatBackend;
use uuid::Uuid;

/// Per-session behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Read the reply incrementally instead of as one body
    pub stream: bool,
    /// Send and grow the whole history instead of one-shot questions
    pub retain_history: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stream: true,
            retain_history: true,
        }
    }
}

/// Outcome of one exchange
#[derive(Debug)]
pub struct Reply {
    /// Assistant text received, possibly partial
    pub text: String,
    /// Fatal error that cut the reply short
    pub error: Option<ChatError>,
    /// Stream lines that could not be decoded
    pub malformed_lines: usize,
}

impl Reply {
    fn failed(text: String, error: ChatError, malformed_lines: usize) -> Self {
        Self {
            text,
            error: Some(error),
            malformed_lines,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Text for the user, annotated when the reply is incomplete
    pub fn display_text(&self) -> String {
        match &self.error {
            None => self.text.clone(),
            Some(err) if self.text.is_empty() => err.diagnostic().to_string(),
            Some(err) => format!("{}\n\n{}", self.text, err.diagnostic()),
        }
    }
}

/// Explicit conversation context.
///
/// Holds the history the backend sees. With `retain_history`, every
/// successful exchange adds one user and one assistant turn; a failed
/// exchange leaves the history as it was.
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    history: ConversationHistory,
    options: SessionOptions,
}

impl ChatSession {
    pub fn new(options: SessionOptions) -> Self {
        Self::with_history(ConversationHistory::new(), options)
    }

    pub fn with_history(history: ConversationHistory, options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            history,
            options,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask `user_text`, forwarding reply fragments to `on_fragment` as they arrive
    pub async fn send<F>(
        &mut self,
        backend: &dyn ChatBackend,
        user_text: &str,
        mut on_fragment: F,
    ) -> Reply
    where
        F: FnMut(&str) + Send,
    {
        let one_shot;
        let request = if self.options.retain_history {
            self.history.push(Turn::user(user_text));
            &self.history
        } else {
            one_shot = ConversationHistory::from(vec![Turn::user(user_text)]);
            &one_shot
        };

        tracing::debug!(
            session = %self.id,
            model = %backend.model_id(),
            turns = request.len(),
            stream = self.options.stream,
            "Sending user turn"
        );

        let reply = if self.options.stream {
            stream_reply(backend, request, &mut on_fragment).await
        } else {
            complete_reply(backend, request, &mut on_fragment).await
        };

        match &reply.error {
            None => {
                if self.options.retain_history {
                    self.history.push(Turn::assistant(reply.text.clone()));
                }
                tracing::info!(
                    session = %self.id,
                    turns = self.history.len(),
                    chars = reply.text.chars().count(),
                    malformed = reply.malformed_lines,
                    "Assistant reply complete"
                );
            }
            Some(err) => {
                if self.options.retain_history {
                    self.history.pop();
                }
                tracing::warn!(
                    session = %self.id,
                    kind = ?err.kind,
                    error = %err,
                    partial_chars = reply.text.chars().count(),
                    "Assistant reply failed"
                );
            }
        }

        reply
    }
}

async fn stream_reply<F>(
    backend: &dyn ChatBackend,
    request: &ConversationHistory,
    on_fragment: &mut F,
) -> Reply
where
    F: FnMut(&str) + Send,
{
    let mut handle = match backend.begin(request).await {
        Ok(handle) => handle,
        Err(err) => return Reply::failed(String::new(), err, 0),
    };

    let result = handle.drain(on_fragment).await;
    let text = handle.finalize();
    match result {
        Ok(_) => Reply {
            text,
            error: None,
            malformed_lines: handle.malformed_count(),
        },
        Err(err) => Reply::failed(text, err, handle.malformed_count()),
    }
}

async fn complete_reply<F>(
    backend: &dyn ChatBackend,
    request: &ConversationHistory,
    on_fragment: &mut F,
) -> Reply
where
    F: FnMut(&str) + Send,
{
    match backend.complete(request).await {
        Ok(text) => {
            on_fragment(&text);
            Reply {
                text,
                error: None,
                malformed_lines: 0,
            }
        }
        Err(err) => Reply::failed(String::new(), err, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{delta_line, stream_of, MockBackend, Scripted};
    use crate::chat::{ChatErrorKind, Role};
    use bytes::Bytes;

    #[tokio::test]
    async fn streamed_exchange_grows_history() {
        let backend = MockBackend::new();
        backend.queue(stream_of(&["नम", "स्ते"]));
        backend.queue(stream_of(&["ठीक है"]));
        let mut session = ChatSession::new(SessionOptions::default());

        let mut live = String::new();
        let reply = session
            .send(&backend, "राम राम", |f| live.push_str(f))
            .await;
        assert!(reply.is_complete());
        assert_eq!(reply.text, "नमस्ते");
        assert_eq!(live, "नमस्ते");

        session.send(&backend, "धन्यवाद", |_| {}).await;
        let turns = session.history().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[1], Turn::assistant("नमस्ते"));
        assert_eq!(turns[3], Turn::assistant("ठीक है"));

        let requests = backend.recorded_requests();
        assert_eq!(requests[0], vec![Turn::user("राम राम")]);
        assert_eq!(requests[1].len(), 3);
    }

    #[tokio::test]
    async fn one_shot_sends_only_the_new_turn() {
        let backend = MockBackend::new();
        backend.queue(stream_of(&["a"]));
        backend.queue(stream_of(&["b"]));
        let mut session = ChatSession::new(SessionOptions {
            stream: true,
            retain_history: false,
        });

        session.send(&backend, "first", |_| {}).await;
        session.send(&backend, "second", |_| {}).await;

        assert!(session.history().is_empty());
        let requests = backend.recorded_requests();
        assert_eq!(requests[1], vec![Turn::user("second")]);
    }

    #[tokio::test]
    async fn non_streaming_delivers_whole_reply_once() {
        let backend = MockBackend::new();
        backend.queue(Scripted::Complete("पूरा जवाब".to_string()));
        let mut session = ChatSession::new(SessionOptions {
            stream: false,
            retain_history: true,
        });

        let mut calls = Vec::new();
        let reply = session
            .send(&backend, "सवाल", |f| calls.push(f.to_string()))
            .await;
        assert_eq!(reply.text, "पूरा जवाब");
        assert_eq!(calls, vec!["पूरा जवाब"]);
        assert_eq!(session.history().last().map(|t| t.role), Some(Role::Assistant));
    }

    #[tokio::test]
    async fn auth_failure_produces_no_text_and_rolls_back() {
        let backend = MockBackend::new();
        backend.queue(Scripted::Fail(ChatError::auth("invalid key").with_status(401)));
        let mut session = ChatSession::new(SessionOptions::default());

        let mut fragments = 0;
        let reply = session.send(&backend, "hello", |_| fragments += 1).await;
        assert_eq!(reply.error.as_ref().map(|e| e.kind), Some(ChatErrorKind::Auth));
        assert_eq!(reply.text, "");
        assert_eq!(fragments, 0);
        assert!(session.history().is_empty());
        assert_eq!(reply.display_text(), "⚠️ The assistant rejected the API key.");
    }

    #[tokio::test]
    async fn transport_failure_keeps_partial_text_for_display() {
        let backend = MockBackend::new();
        backend.queue(Scripted::Stream(vec![
            Ok(Bytes::from(delta_line("बीज को "))),
            Ok(Bytes::from_static(b"data: garbage\n")),
            Ok(Bytes::from(delta_line("भिगो"))),
            Err(ChatError::transport("reset")),
        ]));
        let mut session = ChatSession::new(SessionOptions::default());

        let reply = session.send(&backend, "बुवाई?", |_| {}).await;
        assert!(!reply.is_complete());
        assert_eq!(reply.text, "बीज को भिगो");
        assert_eq!(reply.malformed_lines, 1);
        assert_eq!(reply.display_text(), "बीज को भिगो\n\n⚠️ The response was cut off.");
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn empty_user_turn_is_sent_as_is() {
        let backend = MockBackend::new();
        backend.queue(stream_of(&[]));
        let mut session = ChatSession::new(SessionOptions::default());

        let reply = session.send(&backend, "", |_| {}).await;
        assert!(reply.is_complete());
        assert_eq!(
            session.history().turns(),
            &[Turn::user(""), Turn::assistant("")]
        );
    }
}
