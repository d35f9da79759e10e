//! Remote Whisper-compatible transcription (`/audio/transcriptions`)

use super::{AudioInput, Transcriber, VoiceError};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// API base, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Wrap mono samples as 16-bit PCM WAV
#[allow(clippy::cast_possible_truncation)]
pub fn pcm_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, VoiceError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| VoiceError::Encode(format!("Failed to initialize WAV writer: {e}")))?;

    for sample in samples {
        let scaled = sample.clamp(-1.0, 1.0) * f32::from(i16::MAX);
        writer
            .write_sample(scaled as i16)
            .map_err(|e| VoiceError::Encode(format!("Failed to write WAV sample: {e}")))?;
    }

    writer
        .finalize()
        .map_err(|e| VoiceError::Encode(format!("Failed to finalize WAV data: {e}")))?;

    Ok(cursor.into_inner())
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a" | "mp4") => "audio/mp4",
        Some("ogg" | "oga") => "audio/ogg",
        Some("webm") => "audio/webm",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// Transcription client for any server exposing the `OpenAI` audio API
pub struct RemoteWhisper {
    client: Client,
    config: WhisperConfig,
}

impl RemoteWhisper {
    pub fn new(config: WhisperConfig) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VoiceError::Request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn audio_part(bytes: Vec<u8>, file_name: String, mime: &str) -> Result<Part, VoiceError> {
        Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(|e| VoiceError::Encode(format!("Failed to build multipart audio part: {e}")))
    }
}

#[async_trait]
impl Transcriber for RemoteWhisper {
    async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String, VoiceError> {
        let part = match audio {
            AudioInput::Pcm {
                samples,
                sample_rate,
            } => {
                if samples.is_empty() {
                    return Ok(String::new());
                }
                let wav = pcm_to_wav(&samples, sample_rate)?;
                Self::audio_part(wav, "recording.wav".to_string(), "audio/wav")?
            }
            AudioInput::File(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|source| VoiceError::File {
                        path: path.clone(),
                        source,
                    })?;
                let file_name = path
                    .file_name()
                    .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
                Self::audio_part(bytes, file_name, mime_for(&path))?
            }
        };

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "json");
        let language = language.trim();
        if !language.is_empty() && language != "auto" {
            form = form.text("language", language.to_string());
        }

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim().trim_end_matches('/')
        );
        tracing::debug!(url = %url, "Sending transcription request");

        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            request = request.bearer_auth(key.trim());
        }

        let response = request
            .send()
            .await
            .map_err(|e| VoiceError::Request(format!("Transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(VoiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Response(format!("Failed to parse transcription: {e}")))?;

        Ok(body.text.trim().to_string())
    }
}
