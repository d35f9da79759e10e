//! One voice exchange: transcribe, ask, speak

use crate::chat::{ChatBackend, ChatSession, Reply};
use crate::voice::{AudioInput, Synthesizer, Transcriber, VoiceError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no transcriber configured")]
    NoTranscriber,
    #[error("transcription failed: {0}")]
    Transcription(#[from] VoiceError),
    #[error("no speech recognized")]
    EmptyTranscript,
}

/// Result of one exchange
#[derive(Debug)]
pub struct VoiceTurn {
    /// What the user said or typed
    pub transcript: String,
    pub reply: Reply,
    /// Spoken reply, when synthesis is enabled and succeeded
    pub audio: Option<Vec<u8>>,
}

/// Glue between the speech collaborators and a chat session
pub struct VoiceAssistant {
    backend: Arc<dyn ChatBackend>,
    transcriber: Option<Arc<dyn Transcriber>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    language: String,
}

impl VoiceAssistant {
    pub fn new(backend: Arc<dyn ChatBackend>, language: impl Into<String>) -> Self {
        Self {
            backend,
            transcriber: None,
            synthesizer: None,
            language: language.into(),
        }
    }

    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn can_transcribe(&self) -> bool {
        self.transcriber.is_some()
    }

    /// Transcribe `audio` and answer it
    pub async fn handle_audio<F>(
        &self,
        session: &mut ChatSession,
        audio: AudioInput,
        on_fragment: F,
    ) -> Result<VoiceTurn, AssistantError>
    where
        F: FnMut(&str) + Send,
    {
        let transcript = self.transcribe(audio).await?;
        Ok(self.handle_text(session, transcript, on_fragment).await)
    }

    /// Turn `audio` into the user's text
    pub async fn transcribe(&self, audio: AudioInput) -> Result<String, AssistantError> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or(AssistantError::NoTranscriber)?;
        let transcript = transcriber.transcribe(audio, &self.language).await?;
        if transcript.trim().is_empty() {
            return Err(AssistantError::EmptyTranscript);
        }
        tracing::info!(chars = transcript.chars().count(), "Transcribed user audio");
        Ok(transcript)
    }

    /// Answer typed text
    pub async fn handle_text<F>(
        &self,
        session: &mut ChatSession,
        text: String,
        on_fragment: F,
    ) -> VoiceTurn
    where
        F: FnMut(&str) + Send,
    {
        let reply = session
            .send(self.backend.as_ref(), &text, on_fragment)
            .await;
        let audio = self.speak(&reply).await;
        VoiceTurn {
            transcript: text,
            reply,
            audio,
        }
    }

    async fn speak(&self, reply: &Reply) -> Option<Vec<u8>> {
        let synthesizer = self.synthesizer.as_ref()?;
        if reply.text.trim().is_empty() {
            return None;
        }
        match synthesizer.synthesize(&reply.text, &self.language).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed; reply stays text-only");
                None
            }
        }
    }
}
