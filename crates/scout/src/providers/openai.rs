use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::base::{Provider, ProviderEvent, ProviderStream};
use super::configs::OpenAiProviderConfig;
use super::sse::SseDecoder;
use super::utils::{messages_to_openai_spec, tools_to_openai_spec, ToolCallAssembler};
use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// Streams chat completions from an OpenAI-compatible endpoint such as OpenRouter
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> ProviderResult<Self> {
        // The reply deadline is enforced by the agent; the client only bounds connecting.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> ProviderResult<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true
        });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> ProviderResult<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Accept", "text/event-stream")
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(ProviderError::Unavailable {
                    status: status.as_u16(),
                })
            }
            status => Err(ProviderError::Request {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// What one decoded chunk of the completion stream contributes
enum ChunkOutcome {
    Continue,
    Finished,
}

fn handle_chunk(
    data: &str,
    text: &mut Vec<String>,
    assembler: &mut ToolCallAssembler,
) -> ProviderResult<ChunkOutcome> {
    if data == "[DONE]" {
        return Ok(ChunkOutcome::Finished);
    }

    let chunk: Value = serde_json::from_str(data)?;
    if let Some(error) = chunk.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::Api(message));
    }

    let Some(choice) = chunk.get("choices").and_then(|c| c.get(0)) else {
        // usage-only chunks carry no choices
        return Ok(ChunkOutcome::Continue);
    };

    if let Some(delta) = choice.get("delta") {
        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                text.push(content.to_string());
            }
        }
        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            assembler.push(tool_calls);
        }
    }

    if choice
        .get("finish_reason")
        .map(|reason| !reason.is_null())
        .unwrap_or(false)
    {
        return Ok(ChunkOutcome::Finished);
    }
    Ok(ChunkOutcome::Continue)
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> ProviderResult<ProviderStream> {
        let payload = self.payload(system, messages, tools)?;
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            "requesting completion"
        );
        let response = self.post(&payload).await?;
        Ok(Box::pin(completion_events(response)))
    }
}

/// Decode the streamed completion into provider events.
///
/// Text is yielded as soon as it is decoded; tool calls are only complete once the
/// choice finishes, so they are yielded last, followed by `Finish`.
fn completion_events(
    response: reqwest::Response,
) -> impl Stream<Item = ProviderResult<ProviderEvent>> + Send + 'static {
    async_stream::try_stream! {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = SseDecoder::new();
        let mut assembler = ToolCallAssembler::new();
        let mut finished = false;

        while !finished {
            let events = match body.next().await {
                Some(chunk) => decoder.push(&chunk?),
                None => {
                    finished = true;
                    decoder.finish()
                }
            };

            for data in events {
                let mut text = Vec::new();
                let outcome = handle_chunk(&data, &mut text, &mut assembler)?;
                for fragment in text {
                    yield ProviderEvent::Text(fragment);
                }
                if let ChunkOutcome::Finished = outcome {
                    finished = true;
                    break;
                }
            }
        }

        for request in assembler.finish() {
            yield ProviderEvent::ToolRequest(request);
        }
        yield ProviderEvent::Finish;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(chunks: &[Value]) -> String {
        let mut body = String::from(": OPENROUTER PROCESSING\n\n");
        for chunk in chunks {
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn setup_mock_server(status: u16, body: String) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o".to_string(),
            temperature: Some(0.2),
            max_tokens: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    fn delta(delta: Value) -> Value {
        json!({"choices": [{"index": 0, "delta": delta, "finish_reason": null}]})
    }

    fn finish(reason: &str) -> Value {
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
    }

    #[tokio::test]
    async fn test_stream_text() {
        let body = sse_body(&[
            delta(json!({"role": "assistant", "content": ""})),
            delta(json!({"content": "Hello"})),
            delta(json!({"content": ", world"})),
            finish("stop"),
        ]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let events: Vec<_> = provider
            .stream("You are helpful.", &[Message::user().with_text("Hi")], &[])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                ProviderEvent::Text("Hello".to_string()),
                ProviderEvent::Text(", world".to_string()),
                ProviderEvent::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_tool_call() {
        let body = sse_body(&[
            delta(json!({"tool_calls": [{"index": 0, "id": "call_123", "type": "function",
                "function": {"name": "search_startups", "arguments": ""}}]})),
            delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "{\"keywords\":"}}]})),
            delta(json!({"tool_calls": [{"index": 0, "function": {"arguments": "[\"fintech\"],\"city\":\"New York\"}"}}]})),
            finish("tool_calls"),
        ]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let tool = Tool::new("search_startups", "Search", json!({"type": "object"}));
        let events: Vec<_> = provider
            .stream("sys", &[Message::user().with_text("fintech in NYC")], &[tool])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        match &events[0] {
            ProviderEvent::ToolRequest(request) => {
                assert_eq!(request.id, "call_123");
                assert_eq!(request.tool_call.name, "search_startups");
                assert_eq!(
                    request.tool_call.arguments,
                    json!({"keywords": ["fintech"], "city": "New York"})
                );
            }
            other => panic!("Expected tool request, got {:?}", other),
        }
        assert_eq!(events[1], ProviderEvent::Finish);
    }

    #[tokio::test]
    async fn test_rate_limit_is_unavailable() {
        let (_server, provider) = setup_mock_server(429, String::new()).await;
        let result = provider.stream("sys", &[Message::user().with_text("Hi")], &[]).await;
        assert!(matches!(
            result,
            Err(ProviderError::Unavailable { status: 429 })
        ));
    }

    #[tokio::test]
    async fn test_bad_request_keeps_body() {
        let (_server, provider) =
            setup_mock_server(400, "{\"error\": \"bad model\"}".to_string()).await;
        match provider.stream("sys", &[Message::user().with_text("Hi")], &[]).await {
            Err(ProviderError::Request { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("bad model"));
            }
            other => panic!("Expected request error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_in_band_error() {
        let body = sse_body(&[
            delta(json!({"content": "Par"})),
            json!({"error": {"message": "upstream overloaded", "code": 502}}),
        ]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let mut stream = provider
            .stream("sys", &[Message::user().with_text("Hi")], &[])
            .await
            .unwrap();

        assert_eq!(
            stream.try_next().await.unwrap(),
            Some(ProviderEvent::Text("Par".to_string()))
        );
        match stream.try_next().await {
            Err(ProviderError::Api(message)) => assert_eq!(message, "upstream overloaded"),
            other => panic!("Expected API error, got {:?}", other),
        }
    }
}
