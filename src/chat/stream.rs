//! Stateful cursor over one streamed completion

use super::error::{ChatError, ChatErrorKind};
use super::sse::{decode_line, LineSplitter};
use super::types::StreamEvent;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;

/// Raw response body chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// How a stream stopped producing events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `[DONE]` was received
    Done,
    /// Transport closed cleanly without `[DONE]`
    Closed,
    /// A fatal error ended the stream
    Failed(ChatErrorKind),
}

impl Termination {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Done | Self::Closed)
    }
}

/// Cursor over a streamed completion.
///
/// Events come out of [`next_event`](Self::next_event) in wire order and
/// every `Delta` fragment is appended to the accumulated text before it is
/// returned. Once the handle is exhausted the transport is never polled
/// again. Dropping the handle drops the body and releases the connection.
pub struct StreamHandle {
    body: Option<ByteStream>,
    splitter: LineSplitter,
    lines: VecDeque<Vec<u8>>,
    accumulated: String,
    read_timeout: Option<Duration>,
    termination: Option<Termination>,
    deltas: usize,
    malformed: usize,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("accumulated_len", &self.accumulated.len())
            .field("termination", &self.termination)
            .field("deltas", &self.deltas)
            .field("malformed", &self.malformed)
            .finish_non_exhaustive()
    }
}

impl StreamHandle {
    pub fn new(body: ByteStream, read_timeout: Option<Duration>) -> Self {
        Self {
            body: Some(body),
            splitter: LineSplitter::new(),
            lines: VecDeque::new(),
            accumulated: String::new(),
            read_timeout,
            termination: None,
            deltas: 0,
            malformed: 0,
        }
    }

    /// Build a handle over in-memory chunks
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes> + Send + 'static,
    {
        let body = futures::stream::iter(chunks.into_iter().map(|c| Ok::<_, ChatError>(c.into())))
            .boxed();
        Self::new(body, None)
    }

    /// Next decoded event, `Ok(None)` once the stream is exhausted.
    ///
    /// Fatal errors exhaust the handle; the text accumulated so far stays
    /// available through [`finalize`](Self::finalize).
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ChatError> {
        loop {
            if self.termination.is_some() {
                return Ok(None);
            }

            if let Some(line) = self.lines.pop_front() {
                if let Some(event) = decode_line(&line) {
                    self.apply(&event);
                    return Ok(Some(event));
                }
                continue;
            }

            let Some(body) = self.body.as_mut() else {
                self.finish(Termination::Closed);
                continue;
            };

            let next = match self.read_timeout {
                Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let err = ChatError::timeout(format!(
                            "No stream data within {}s",
                            limit.as_secs_f32()
                        ));
                        return Err(self.fail(err));
                    }
                },
                None => body.next().await,
            };

            match next {
                Some(Ok(chunk)) => self.splitter.push(&chunk, &mut self.lines),
                Some(Err(err)) => return Err(self.fail(err)),
                None => {
                    self.body = None;
                    if let Some(tail) = self.splitter.finish() {
                        self.lines.push_back(tail);
                    }
                }
            }
        }
    }

    /// Run the stream to exhaustion, handing each fragment to `on_fragment`
    pub async fn drain<F>(&mut self, mut on_fragment: F) -> Result<String, ChatError>
    where
        F: FnMut(&str) + Send,
    {
        while let Some(event) = self.next_event().await? {
            if let StreamEvent::Delta { fragment } = &event {
                on_fragment(fragment);
            }
        }
        Ok(self.finalize())
    }

    /// The accumulated response. Idempotent.
    pub fn finalize(&self) -> String {
        self.accumulated.clone()
    }

    /// Live view of the text received so far
    pub fn partial(&self) -> &str {
        &self.accumulated
    }

    pub fn is_exhausted(&self) -> bool {
        self.termination.is_some()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Delta { fragment } => {
                self.accumulated.push_str(fragment);
                self.deltas += 1;
            }
            StreamEvent::Done => self.finish(Termination::Done),
            StreamEvent::Malformed { raw } => {
                self.malformed += 1;
                tracing::warn!(raw = %raw, "Skipping malformed stream line");
            }
        }
    }

    fn finish(&mut self, termination: Termination) {
        self.termination = Some(termination);
        self.body = None;
        self.lines.clear();
        tracing::debug!(
            termination = ?termination,
            deltas = self.deltas,
            malformed = self.malformed,
            chars = self.accumulated.chars().count(),
            "Completion stream finished"
        );
    }

    fn fail(&mut self, err: ChatError) -> ChatError {
        self.finish(Termination::Failed(err.kind));
        err
    }
}
