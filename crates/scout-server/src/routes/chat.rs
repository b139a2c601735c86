use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use scout::models::message::Message;
use scout::transport::{self, ChunkStream};
use serde::Deserialize;
use tracing::{debug, warn};

/// Chunks buffered ahead of a slow client
const CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
}

// Messages as sent by the chat UI; either `parts` or a plain `content` string
#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    id: Option<String>,
    role: String,
    #[serde(default)]
    parts: Option<Vec<MessagePart>>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl IncomingMessage {
    fn text(&self) -> String {
        match &self.parts {
            Some(parts) => parts
                .iter()
                .filter(|part| part.kind == "text")
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join(" "),
            None => self.content.clone().unwrap_or_default(),
        }
    }
}

fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        let message = match msg.role.as_str() {
            "user" => Message::user(),
            "assistant" => Message::assistant(),
            _ => {
                warn!("Skipping message with unsupported role: {}", msg.role);
                continue;
            }
        };

        let text = msg.text();
        if text.trim().is_empty() {
            debug!(role = %msg.role, "skipping message without text");
            continue;
        }

        let message = match msg.id {
            Some(id) => message.with_id(id),
            None => message,
        };
        messages.push(message.with_text(text));
    }

    messages
}

/// Plain text body whose chunks concatenate to the assistant's reply
pub struct TextStreamResponse {
    body: ChunkStream,
}

impl IntoResponse for TextStreamResponse {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(self.body),
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<TextStreamResponse, StatusCode> {
    let messages = convert_messages(request.messages);
    if messages.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let (sender, body) = transport::channel(CHANNEL_BUFFER);
    let agent = state.agent();
    let options = state.forward_options;

    tokio::spawn(async move {
        let outcome = transport::forward(agent.reply(&messages), &sender, options).await;
        debug!(?outcome, "chat turn finished");
    });

    Ok(TextStreamResponse { body })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
