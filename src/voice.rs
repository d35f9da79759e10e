//! Speech collaborators: transcription and synthesis
//!
//! The chat core never touches audio. These traits are the seams the voice
//! assistant uses to turn microphone or uploaded audio into text and the
//! reply back into speech.

mod tts;
mod whisper;

pub use tts::{split_for_speech, GoogleTts, MAX_CHUNK_CHARS};
pub use whisper::{pcm_to_wav, RemoteWhisper, WhisperConfig};

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Sample rate the microphone widget delivers
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Audio handed over by the capture widget
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Decoded mono samples in `[-1.0, 1.0]`
    Pcm { samples: Vec<f32>, sample_rate: u32 },
    /// Uploaded audio file
    File(PathBuf),
}

impl AudioInput {
    pub fn pcm(samples: Vec<f32>) -> Self {
        Self::Pcm {
            samples,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("nothing to synthesize")]
    EmptyText,
    #[error("failed to read audio file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode audio: {0}")]
    Encode(String),
    #[error("speech request failed: {0}")]
    Request(String),
    #[error("speech service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected speech service response: {0}")]
    Response(String),
}

/// Speech-to-text provider
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Best-effort transcript of `audio` in `language`
    async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String, VoiceError>;
}

/// Text-to-speech provider
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Encoded audio (MP3) speaking `text` in `language`
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, VoiceError>;
}
