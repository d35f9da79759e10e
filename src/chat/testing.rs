//! Mock implementations for testing
//!
//! These mocks let session and assistant tests run without real I/O.

use super::error::ChatError;
use super::stream::StreamHandle;
use super::types::{ConversationHistory, Turn};
use super::ChatBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;

/// Serve `router` on an ephemeral local port
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// One scripted reply
pub enum Scripted {
    /// Body chunks for a streamed reply
    Stream(Vec<Result<Bytes, ChatError>>),
    /// Whole-body reply
    Complete(String),
    /// Failure before any streaming
    Fail(ChatError),
}

/// SSE line carrying one content fragment
pub fn delta_line(fragment: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"choices": [{"delta": {"content": fragment}}]})
    )
}

/// Scripted stream that ends with `[DONE]`
pub fn stream_of(fragments: &[&str]) -> Scripted {
    let mut chunks: Vec<Result<Bytes, ChatError>> = fragments
        .iter()
        .map(|f| Ok(Bytes::from(delta_line(f))))
        .collect();
    chunks.push(Ok(Bytes::from_static(b"data: [DONE]\n")));
    Scripted::Stream(chunks)
}

/// Mock backend that replays queued replies
pub struct MockBackend {
    replies: Mutex<VecDeque<Scripted>>,
    /// Record of every history snapshot sent
    pub requests: Mutex<Vec<Vec<Turn>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, reply: Scripted) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn recorded_requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, history: &ConversationHistory) -> Scripted {
        self.requests
            .lock()
            .unwrap()
            .push(history.turns().to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Fail(ChatError::connection("No mock reply queued")))
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn begin(&self, history: &ConversationHistory) -> Result<StreamHandle, ChatError> {
        match self.next_reply(history) {
            Scripted::Stream(chunks) => Ok(StreamHandle::new(
                futures::stream::iter(chunks).boxed(),
                None,
            )),
            Scripted::Complete(text) => Ok(StreamHandle::from_chunks(vec![
                delta_line(&text),
                "data: [DONE]\n".to_string(),
            ])),
            Scripted::Fail(err) => Err(err),
        }
    }

    async fn complete(&self, history: &ConversationHistory) -> Result<String, ChatError> {
        match self.next_reply(history) {
            Scripted::Complete(text) => Ok(text),
            Scripted::Stream(_) => Err(ChatError::decode("Mock reply was scripted as a stream")),
            Scripted::Fail(err) => Err(err),
        }
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}
