//! `AnnaData`: Hindi voice and text assistant for farmers
//!
//! The core is [`chat`]: a streaming chat-completions consumer that turns an
//! `OpenRouter` `data:` line stream into ordered text fragments. [`voice`]
//! supplies transcription and speech synthesis, and [`assistant`] joins them
//! into one exchange.

pub mod assistant;
pub mod chat;
pub mod config;
pub mod voice;
