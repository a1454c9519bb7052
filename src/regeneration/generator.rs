use async_trait::async_trait;

use crate::config::StyleOptions;
use crate::error::GeneratorError;

/// External text generator that produces replacement comments.
///
/// Timeouts and retries are the implementation's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        language_id: &str,
        prompt: &str,
        style: &StyleOptions,
    ) -> Result<String, GeneratorError>;
}

impl GeneratorError {
    /// Classify an HTTP-style status code returned by a remote generator.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => GeneratorError::Auth,
            429 => GeneratorError::RateLimit,
            500..=599 => GeneratorError::TransientServer,
            _ => GeneratorError::Other(message.into()),
        }
    }

    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeneratorError::RateLimit | GeneratorError::TransientServer)
    }
}
