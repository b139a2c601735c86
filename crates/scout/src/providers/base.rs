use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::ProviderResult;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;

/// One increment of a model's reply
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A fragment of free text, in generation order
    Text(String),
    /// A complete request to run a tool
    ToolRequest(ToolRequest),
    /// The model has finished this reply
    Finish,
}

pub type ProviderStream = BoxStream<'static, ProviderResult<ProviderEvent>>;

/// Base trait for AI providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start generating the next assistant message for the given transcript, returning the
    /// reply as it is produced
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<ProviderStream>;
}
