//! Console transport: answers on stdout, speech only logged

use anyhow::Result;
use async_trait::async_trait;
use hearth_brain::{DeliverySink, SpeechSynthesizer};
use hearth_types::DeliveryEvent;
use std::io::Write;
use tracing::debug;

pub struct ConsoleSink;

#[async_trait]
impl DeliverySink for ConsoleSink {
    async fn deliver(&self, event: DeliveryEvent) -> Result<()> {
        let mut out = std::io::stdout().lock();
        match event {
            DeliveryEvent::TypingStarted => debug!("Typing started"),
            DeliveryEvent::TypingStopped => debug!("Typing stopped"),
            DeliveryEvent::Answer {
                text,
                widget,
                replace,
                ..
            } => {
                let prefix = if replace.is_some() { "~ " } else { "" };
                if !text.is_empty() {
                    writeln!(out, "{}{}", prefix, text)?;
                }
                if let Some(widget) = widget {
                    let name = widget.get("widget").and_then(|w| w.as_str()).unwrap_or("widget");
                    writeln!(out, "{}[{}]", prefix, name)?;
                }
            }
            DeliveryEvent::Suggestions { items } => {
                writeln!(out, "  {}", items.iter().map(|s| format!("[{}]", s)).collect::<Vec<_>>().join(" "))?;
            }
            DeliveryEvent::Interruption => writeln!(out, "(interrupted)")?,
        }
        out.flush()?;
        Ok(())
    }
}

/// Stand-in for a text-to-speech engine
pub struct LoggedSpeech;

#[async_trait]
impl SpeechSynthesizer for LoggedSpeech {
    async fn synthesize(&self, speech: &str, end_of_turn: bool) -> Result<()> {
        debug!("Speak (end of turn: {}): {}", end_of_turn, speech);
        Ok(())
    }
}
