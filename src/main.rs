//! `AnnaData` terminal front-end
//!
//! Typed questions come from stdin, one per line. Audio files given on the
//! command line are transcribed first and answered in order.

use annadata::assistant::{AssistantError, VoiceAssistant, VoiceTurn};
use annadata::chat::{ChatBackend, ChatSession, LoggingBackend, OpenRouterClient};
use annadata::config::AppConfig;
use annadata::voice::{AudioInput, GoogleTts, RemoteWhisper};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BANNER: &str = "🧑‍🌾 AnnaData: आपका कृषि सहायक";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annadata=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        model = %config.client.model,
        stream = config.session.stream,
        retain_history = config.session.retain_history,
        "Starting AnnaData"
    );

    let client = OpenRouterClient::new(config.client.clone())?;
    let backend: Arc<dyn ChatBackend> = Arc::new(LoggingBackend::new(Arc::new(client)));

    let mut assistant = VoiceAssistant::new(backend, config.language.clone());
    if let Some(whisper) = config.whisper.clone() {
        assistant = assistant.with_transcriber(Arc::new(RemoteWhisper::new(whisper)?));
    }
    if config.tts_enabled {
        assistant = assistant.with_synthesizer(Arc::new(GoogleTts::new()?));
    }

    let mut session = ChatSession::new(config.session);
    tracing::info!(session = %session.id(), "Session ready");
    println!("{BANNER}");

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    let mut replies = 0usize;

    if files.is_empty() {
        println!("अपना सवाल लिखें (खाली पंक्ति छोड़ दी जाती है, /clear से बातचीत नई होती है)");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if text == "/clear" {
                session.clear();
                println!("बातचीत साफ़ कर दी गई।");
                continue;
            }
            let turn = assistant
                .handle_text(&mut session, text.to_string(), print_fragment())
                .await;
            finish_turn(&turn, &mut replies).await;
        }
        return Ok(());
    }

    if !assistant.can_transcribe() {
        return Err("audio files need WHISPER_BASE_URL to be set".into());
    }
    for path in files {
        let transcript = match assistant.transcribe(AudioInput::File(path.clone())).await {
            Ok(transcript) => transcript,
            Err(AssistantError::EmptyTranscript) => {
                println!("⚠️ {}: कोई आवाज़ नहीं पहचानी गई।", path.display());
                continue;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Transcription failed");
                println!("⚠️ {}: {e}", path.display());
                continue;
            }
        };
        println!("आपने कहा: {transcript}");
        let turn = assistant
            .handle_text(&mut session, transcript, print_fragment())
            .await;
        finish_turn(&turn, &mut replies).await;
    }

    Ok(())
}

/// Prints fragments as they arrive, prefixing the first one
fn print_fragment() -> impl FnMut(&str) + Send {
    let mut started = false;
    move |fragment: &str| {
        if fragment.is_empty() {
            return;
        }
        let mut out = std::io::stdout().lock();
        if !started {
            let _ = write!(out, "सहायक: ");
            started = true;
        }
        let _ = write!(out, "{fragment}");
        let _ = out.flush();
    }
}

async fn finish_turn(turn: &VoiceTurn, replies: &mut usize) {
    let reply = &turn.reply;
    match &reply.error {
        None if reply.text.is_empty() => println!("सहायक: (कोई उत्तर नहीं)"),
        None => println!(),
        Some(err) if reply.text.is_empty() => println!("{}", err.diagnostic()),
        Some(err) => println!("\n\n{}", err.diagnostic()),
    }

    let Some(audio) = &turn.audio else {
        return;
    };
    *replies += 1;
    let path = PathBuf::from(format!("annadata-reply-{replies}.mp3"));
    match tokio::fs::write(&path, audio).await {
        Ok(()) => println!("🔊 {}", path.display()),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to write reply audio"),
    }
}
