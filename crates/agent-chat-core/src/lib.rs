pub mod agent;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod images;
pub mod state;

// Re-export main types for convenience
pub use agent::{AgentClient, AgentService};
pub use config::Config;
pub use dispatch::{dispatch, FailurePolicy, TurnOutcome};
pub use error::{DispatchError, DispatchResult, Endpoint};
pub use images::{export_images, ImageRef};
pub use state::{ChatMessage, ChatRole, Conversation};
