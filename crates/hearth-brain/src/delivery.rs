//! Collaborators on the output side: transport and speech synthesis

use anyhow::Result;
use async_trait::async_trait;
use hearth_types::DeliveryEvent;

/// Transport receiving every delivery event, in order
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, event: DeliveryEvent) -> Result<()>;
}

/// Text-to-speech engine
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, speech: &str, end_of_turn: bool) -> Result<()>;
}
