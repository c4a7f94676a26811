//! Errors raised while talking to the agent service.

use thiserror::Error;

/// Which remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Agent,
    Images,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Agent => "agent",
            Endpoint::Images => "image lookup",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during one dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request could not be sent or the body could not be read.
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-OK status.
    #[error("{endpoint} returned {status}{}", format_detail(.detail))]
    Status {
        endpoint: Endpoint,
        status: u16,
        detail: Option<String>,
    },

    /// The body did not have the expected shape.
    #[error("{endpoint} response was malformed: {reason}")]
    Malformed { endpoint: Endpoint, reason: String },
}

impl DispatchError {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            DispatchError::Transport { endpoint, .. }
            | DispatchError::Status { endpoint, .. }
            | DispatchError::Malformed { endpoint, .. } => *endpoint,
        }
    }
}

fn format_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Result type for agent calls.
pub type DispatchResult<T> = Result<T, DispatchError>;
