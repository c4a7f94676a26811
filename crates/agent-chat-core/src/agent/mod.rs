use std::future::Future;

use crate::error::DispatchResult;

pub mod client;

pub use client::{AgentClient, InvokeRequest};

/// The two remote calls one turn needs.
///
/// `AgentClient` talks HTTP; tests substitute in-memory services.
pub trait AgentService {
    /// Ask the agent and return its reply text.
    fn ask(&self, query: &str) -> impl Future<Output = DispatchResult<String>> + Send;

    /// Look up images related to the query.
    fn images(&self, query: &str) -> impl Future<Output = DispatchResult<Vec<String>>> + Send;
}
