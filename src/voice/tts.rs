//! Google Translate text-to-speech
//!
//! The endpoint only accepts short inputs, so text is cut into chunks of at
//! most [`MAX_CHUNK_CHARS`] characters, preferring clause boundaries, and
//! the MP3 segments are concatenated.

use super::{Synthesizer, VoiceError};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

pub const MAX_CHUNK_CHARS: usize = 100;

const DEFAULT_URL: &str = "https://translate.google.com/translate_tts";

/// Characters that close a clause; `।` and `॥` are the Devanagari dandas
const CLAUSE_ENDS: &[char] = &['.', '!', '?', '।', '॥', ';', ':', ','];

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `text` into speakable chunks of at most `max_chars` characters
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for piece in clauses(text)
        .iter()
        .flat_map(|clause| fit(clause, max_chars))
    {
        if current.is_empty() {
            current = piece;
        } else if char_len(&current) + 1 + char_len(&piece) <= max_chars {
            current.push(' ');
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Whitespace-normalized clauses that contain something to pronounce
fn clauses(text: &str) -> Vec<String> {
    fn flush(out: &mut Vec<String>, current: &mut String) {
        let clause = current.trim();
        if clause.chars().any(char::is_alphanumeric) {
            out.push(clause.to_string());
        }
        current.clear();
    }

    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !current.is_empty() && !current.ends_with(' ') {
                current.push(' ');
            }
            continue;
        }
        current.push(ch);
        if CLAUSE_ENDS.contains(&ch) {
            flush(&mut out, &mut current);
        }
    }
    flush(&mut out, &mut current);
    out
}

/// Break one clause at word, then character, boundaries
fn fit(clause: &str, max_chars: usize) -> Vec<String> {
    if char_len(clause) <= max_chars {
        return vec![clause.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in clause.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for part in chars.chunks(max_chars) {
            let part: String = part.iter().collect();
            if current.is_empty() {
                current = part;
            } else if char_len(&current) + 1 + char_len(&part) <= max_chars {
                current.push(' ');
                current.push_str(&part);
            } else {
                pieces.push(std::mem::replace(&mut current, part));
            }
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Speech synthesis through the public Translate TTS endpoint
pub struct GoogleTts {
    client: Client,
    url: String,
}

impl GoogleTts {
    pub fn new() -> Result<Self, VoiceError> {
        Self::with_url(DEFAULT_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VoiceError::Request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, VoiceError> {
        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(VoiceError::EmptyText);
        }

        let total = chunks.len().to_string();
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            tracing::debug!(idx, total = %total, chars = char_len(chunk), "Synthesizing chunk");
            let response = self
                .client
                .get(&self.url)
                .header(USER_AGENT, "Mozilla/5.0")
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.to_string().as_str()),
                    ("textlen", char_len(chunk).to_string().as_str()),
                ])
                .send()
                .await
                .map_err(|e| VoiceError::Request(format!("Synthesis request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(VoiceError::Status {
                    status: status.as_u16(),
                    message,
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| VoiceError::Response(format!("Failed to read audio: {e}")))?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::serve;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const LONG_HINDI: &str = "गेहूं की बुवाई नवंबर के पहले पखवाड़े में करें। \
        बीज को बोने से पहले उपचारित करना जरूरी है, इससे फसल रोगों से बची रहती है। \
        पहली सिंचाई बुवाई के इक्कीस दिन बाद करें और खेत में पानी जमा न होने दें। \
        खाद की मात्रा मिट्टी की जांच के आधार पर तय करें!";

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(
            split_for_speech("  नमस्ते,   किसान   भाई! ", MAX_CHUNK_CHARS),
            vec!["नमस्ते, किसान भाई!"]
        );
    }

    #[test]
    fn long_text_respects_limit_and_order() {
        let chunks = split_for_speech(LONG_HINDI, MAX_CHUNK_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| char_len(c) <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" "), normalized(LONG_HINDI));
    }

    #[test]
    fn prefers_clause_boundaries() {
        let chunks = split_for_speech("पहला वाक्य। दूसरा वाक्य।", 12);
        assert_eq!(chunks, vec!["पहला वाक्य।", "दूसरा वाक्य।"]);
    }

    #[test]
    fn oversized_word_is_cut_by_characters() {
        let word = "क".repeat(250);
        let chunks = split_for_speech(&word, MAX_CHUNK_CHARS);
        let lens: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }

    #[test]
    fn punctuation_only_text_has_nothing_to_say() {
        assert!(split_for_speech("  ... ।। \n !", MAX_CHUNK_CHARS).is_empty());
        assert!(split_for_speech("", MAX_CHUNK_CHARS).is_empty());
    }

    type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

    #[tokio::test]
    async fn concatenates_chunk_audio_in_order() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/translate_tts",
                get(
                    |State(seen): State<Seen>, Query(params): Query<HashMap<String, String>>| async move {
                        let idx = params["idx"].clone();
                        seen.lock().unwrap().push(params);
                        format!("mp3-{idx};")
                    },
                ),
            )
            .with_state(seen.clone());
        let addr = serve(router).await;
        let tts = GoogleTts::with_url(format!("http://{addr}/translate_tts")).unwrap();

        let audio = tts.synthesize(LONG_HINDI, "hi").await.unwrap();
        let expected_chunks = split_for_speech(LONG_HINDI, MAX_CHUNK_CHARS);
        let expected: String = (0..expected_chunks.len())
            .map(|i| format!("mp3-{i};"))
            .collect();
        assert_eq!(audio, expected.into_bytes());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), expected_chunks.len());
        assert_eq!(seen[0]["tl"], "hi");
        assert_eq!(seen[0]["q"], expected_chunks[0]);
        assert_eq!(seen[0]["total"], expected_chunks.len().to_string());
    }

    #[tokio::test]
    async fn empty_text_is_rejected_without_request() {
        let tts = GoogleTts::with_url("http://127.0.0.1:9/translate_tts").unwrap();
        let err = tts.synthesize("   ", "hi").await.unwrap_err();
        assert!(matches!(err, VoiceError::EmptyText));
    }

    #[tokio::test]
    async fn rejected_chunk_is_status_error() {
        let router = Router::new().route(
            "/translate_tts",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = serve(router).await;
        let tts = GoogleTts::with_url(format!("http://{addr}/translate_tts")).unwrap();
        let err = tts.synthesize("नमस्ते", "hi").await.unwrap_err();
        assert!(matches!(err, VoiceError::Status { status: 429, .. }));
    }
}
