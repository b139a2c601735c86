use futures::future::join_all;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::errors::{AgentError, AgentResult, ReplyError};
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::prompt::SYSTEM_PROMPT;
use crate::providers::base::{Provider, ProviderEvent};
use crate::tool::ToolHandler;

pub const DEFAULT_MAX_ITERATIONS: usize = 6;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Sent in place of an answer when the model keeps asking for tools
pub const FALLBACK_MESSAGE: &str = "\n\nI couldn't finish this answer within the allowed number of \
search steps. Try narrowing your question or asking again.";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on provider calls in one reply
    pub max_iterations: usize,
    /// Deadline for a single provider call, from the request until its final event
    pub provider_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Output of a reply, in the order it should be shown
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// A fragment of the assistant's answer
    Text(String),
    /// Progress note for a tool call that is about to run
    Status(String),
    /// Explanation sent when the reply was cut off at the iteration limit
    Fallback(String),
}

pub type ReplyStream<'a> = BoxStream<'a, Result<ReplyEvent, ReplyError>>;

/// Where the reply loop is between provider calls
enum TurnState {
    Generating {
        iteration: usize,
    },
    RunningTools {
        iteration: usize,
        requests: Vec<ToolRequest>,
    },
    Finished,
}

/// Agent integrates a foundational LLM with the tools it may call
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: Vec<Box<dyn ToolHandler>>,
    system_prompt: String,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Arc<dyn Provider>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools: Vec::new(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            config,
        }
    }

    /// Add a tool the model may call
    pub fn add_tool(&mut self, tool: Box<dyn ToolHandler>) {
        self.tools.push(tool);
    }

    pub fn with_tool(mut self, tool: Box<dyn ToolHandler>) -> Self {
        self.add_tool(tool);
        self
    }

    pub fn with_system_prompt<S: Into<String>>(mut self, system_prompt: S) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    fn tool_specs(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.tool().clone()).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&dyn ToolHandler> {
        self.tools
            .iter()
            .find(|t| t.tool().name == name)
            .map(|t| t.as_ref())
    }

    fn tool_status(&self, call: &ToolCall) -> Option<String> {
        self.find_tool(&call.name)?.status(&call.arguments)
    }

    async fn dispatch_tool_call(&self, call: &ToolCall) -> AgentResult<Value> {
        let tool = self
            .find_tool(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        debug!(tool = %call.name, "dispatching tool call");
        tool.call(call.arguments.clone()).await
    }

    /// Create a stream that yields the reply to `messages` as it is generated.
    ///
    /// The transcript is copied; tool requests and their results are appended to the copy
    /// only. Dropping the stream abandons the reply, including any provider call or tool
    /// call in flight.
    pub fn reply(&self, messages: &[Message]) -> ReplyStream<'_> {
        let mut messages = messages.to_vec();
        let tools = self.tool_specs();
        let limit = self.config.provider_timeout;

        Box::pin(async_stream::try_stream! {
            let mut state = TurnState::Generating { iteration: 0 };

            loop {
                state = match state {
                    TurnState::Generating { iteration } if iteration >= self.config.max_iterations => {
                        warn!(iteration, "reply stopped at the iteration limit");
                        yield ReplyEvent::Fallback(FALLBACK_MESSAGE.to_string());
                        TurnState::Finished
                    }
                    TurnState::Generating { iteration } => {
                        debug!(iteration, messages = messages.len(), "calling provider");
                        let deadline = Instant::now() + limit;
                        let started = timeout_at(
                            deadline,
                            self.provider.stream(&self.system_prompt, &messages, &tools),
                        )
                        .await
                        .map_err(|_| ReplyError::Timeout(limit))?;
                        let mut events = started?;

                        let mut text = String::new();
                        let mut requests = Vec::new();
                        loop {
                            let next = timeout_at(deadline, events.next())
                                .await
                                .map_err(|_| ReplyError::Timeout(limit))?;
                            match next.transpose()? {
                                Some(ProviderEvent::Text(chunk)) => {
                                    text.push_str(&chunk);
                                    yield ReplyEvent::Text(chunk);
                                }
                                Some(ProviderEvent::ToolRequest(request)) => requests.push(request),
                                Some(ProviderEvent::Finish) | None => break,
                            }
                        }

                        if requests.is_empty() {
                            TurnState::Finished
                        } else {
                            let mut assistant = Message::assistant();
                            if !text.is_empty() {
                                assistant = assistant.with_text(text);
                            }
                            for request in &requests {
                                assistant = assistant
                                    .with_tool_request(request.id.clone(), request.tool_call.clone());
                            }
                            messages.push(assistant);
                            TurnState::RunningTools { iteration, requests }
                        }
                    }
                    TurnState::RunningTools { iteration, requests } => {
                        for request in &requests {
                            if let Some(status) = self.tool_status(&request.tool_call) {
                                yield ReplyEvent::Status(status);
                            }
                        }

                        // Run every call of this round together; results keep request order.
                        let outputs = join_all(
                            requests
                                .iter()
                                .map(|request| self.dispatch_tool_call(&request.tool_call)),
                        )
                        .await;

                        if let Some(fatal) = outputs
                            .iter()
                            .find_map(|output| output.as_ref().err().filter(|e| !e.is_recoverable()))
                        {
                            error!(error = %fatal, "tool call failed");
                            Err::<(), _>(ReplyError::from(fatal.clone()))?;
                        }

                        for (request, output) in requests.iter().zip(outputs) {
                            if let Err(e) = &output {
                                warn!(tool = %request.tool_call.name, error = %e, "tool call rejected");
                            }
                            messages.push(Message::tool().with_tool_response(request.id.clone(), output));
                        }
                        TurnState::Generating { iteration: iteration + 1 }
                    }
                    TurnState::Finished => break,
                };
            }
        })
    }

    /// Run a reply to completion and return the assistant's text
    pub async fn reply_text(&self, messages: &[Message]) -> Result<String, ReplyError> {
        let mut stream = self.reply(messages);
        let mut text = String::new();
        while let Some(event) = stream.next().await {
            if let ReplyEvent::Text(chunk) = event? {
                text.push_str(&chunk);
            }
        }
        Ok(text)
    }
}
