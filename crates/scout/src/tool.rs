use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AgentResult;
use crate::models::tool::Tool;

/// A tool the model may ask the agent to run on its behalf
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The schema advertised to the model
    fn tool(&self) -> &Tool;

    /// A short progress note to show the user while the call runs
    fn status(&self, _arguments: &Value) -> Option<String> {
        None
    }

    /// Validate the arguments and run the tool, returning a JSON payload for the model.
    ///
    /// Return `AgentError::InvalidParameters` for arguments the model can fix, and
    /// `AgentError::ExecutionError` when the tool itself failed.
    async fn call(&self, arguments: Value) -> AgentResult<Value>;
}
