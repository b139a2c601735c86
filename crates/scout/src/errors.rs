use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while resolving or running a single tool call.
///
/// `ToolNotFound` and `InvalidParameters` are recoverable: they are written back into the
/// transcript as the tool's response so the model can correct itself on the next call.
/// `ExecutionError` means the tool itself could not run and ends the reply.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether the model can be told about this error and asked to try again
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_) | AgentError::InvalidParameters(_)
        )
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures talking to the text generation service
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider unavailable: {status}")]
    Unavailable { status: u16 },

    #[error("Request failed: {status}\nBody: {body}")]
    Request { status: u16, body: String },

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Could not decode provider response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures reading the company catalog
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that end a reply. Prior messages are never touched; the partial reply is abandoned.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    #[error("Provider did not finish within {0:?}")]
    Timeout(Duration),
}

impl ReplyError {
    /// Text that is safe to show to the end user in place of the abandoned reply
    pub fn user_message(&self) -> &'static str {
        match self {
            ReplyError::Provider(_) => {
                "The assistant is unavailable right now. Please try again in a moment."
            }
            ReplyError::ToolExecution(_) => {
                "The company search failed, so this question could not be answered."
            }
            ReplyError::Timeout(_) => "The assistant took too long to respond. Please try again.",
        }
    }
}

impl From<AgentError> for ReplyError {
    fn from(err: AgentError) -> Self {
        ReplyError::ToolExecution(err.to_string())
    }
}
