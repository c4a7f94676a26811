//! One conversation turn: both remote calls, joined.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::AgentService;
use crate::error::{DispatchError, DispatchResult};
use crate::state::ChatMessage;

/// What to do with a turn whose calls did not both succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Append an assistant error message and clear the loading indicator.
    #[default]
    Report,
    /// Log only. No message is appended and the loading indicator stays up.
    Stall,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Report => "report",
            FailurePolicy::Stall => "stall",
        }
    }
}

/// Joined result of the agent call and the image lookup for one query.
#[derive(Debug)]
pub struct TurnOutcome {
    pub query: String,
    pub answer: DispatchResult<String>,
    pub images: DispatchResult<Vec<String>>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.answer.is_ok() && self.images.is_ok()
    }

    pub fn errors(&self) -> Vec<&DispatchError> {
        [self.answer.as_ref().err(), self.images.as_ref().err()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// The assistant message this turn produces, if any.
    ///
    /// A successful turn always yields the reply with its images. A failed turn
    /// yields an error message under `Report` and nothing under `Stall`.
    pub fn into_message(self, policy: FailurePolicy) -> Option<ChatMessage> {
        match (self.answer, self.images) {
            (Ok(content), Ok(images)) => Some(ChatMessage::assistant(content, images)),
            (answer, images) => match policy {
                FailurePolicy::Stall => None,
                FailurePolicy::Report => {
                    let mut content = String::from("Error: the request could not be completed.");
                    for err in [answer.err(), images.err()].into_iter().flatten() {
                        content.push('\n');
                        content.push_str(&err.to_string());
                    }
                    Some(ChatMessage::failure(content))
                }
            },
        }
    }
}

/// Run both calls for `query` concurrently and wait for both.
///
/// A failure in one call never cancels or hides the other; each result is kept
/// in the outcome.
pub async fn dispatch<S: AgentService + Sync>(service: &S, query: &str) -> TurnOutcome {
    info!(chars = query.chars().count(), "dispatching turn");

    let (answer, images) = tokio::join!(service.ask(query), service.images(query));

    let outcome = TurnOutcome {
        query: query.to_string(),
        answer,
        images,
    };

    if outcome.is_success() {
        info!(
            images = outcome.images.as_ref().map(Vec::len).unwrap_or(0),
            "turn completed"
        );
    } else {
        for err in outcome.errors() {
            warn!(endpoint = %err.endpoint(), error = %err, "turn failed");
        }
    }

    outcome
}
