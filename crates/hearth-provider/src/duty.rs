use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a completion duty
#[derive(Debug, Error)]
pub enum DutyError {
    #[error("inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),

    #[error("malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A narrow, single-purpose call into the inference collaborator
///
/// `init` is idempotent unless `force` is set; `execute` may be called
/// without a prior `init`, the context is then acquired on demand.
#[async_trait]
pub trait Duty: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn init(&self, force: bool) -> Result<(), DutyError>;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output, DutyError>;
}
