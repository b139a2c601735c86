//! Delivery of a reply to a client as a stream of UTF-8 text chunks.
//!
//! The reply is pulled only as fast as the client drains it. When the client goes away
//! the reply stream is dropped, which cancels whatever provider or tool call it was
//! waiting on.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::agent::{ReplyEvent, ReplyStream};

/// Prefix of the final chunk written when a reply fails part way through.
/// Clients should discard the partial answer and show the text after the marker.
pub const ERROR_MARKER: &str = "\n\n[[error]] ";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Client disconnected")]
pub struct Disconnected;

/// Writing half of a chunk channel
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<Bytes>,
}

impl ChunkSender {
    /// Queue a chunk, waiting while the client is behind
    pub async fn send<B: Into<Bytes>>(&self, chunk: B) -> Result<(), Disconnected> {
        self.tx.send(chunk.into()).await.map_err(|_| Disconnected)
    }

    /// Resolves once the reading half has been dropped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Reading half of a chunk channel, usable as an HTTP response body
#[derive(Debug)]
pub struct ChunkStream {
    inner: ReceiverStream<Bytes>,
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|chunk| chunk.map(Ok))
    }
}

/// Create a bounded chunk channel
pub fn channel(buffer: usize) -> (ChunkSender, ChunkStream) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        ChunkSender { tx },
        ChunkStream {
            inner: ReceiverStream::new(rx),
        },
    )
}

#[derive(Debug, Clone, Copy)]
pub struct ForwardOptions {
    /// Write tool status notes into the text stream
    pub announce_tools: bool,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            announce_tools: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Every event was delivered
    Completed,
    /// The reply failed and the error marker was written
    Failed,
    /// The client went away before the reply finished
    Disconnected,
}

/// Drive `reply` to completion, writing its text to `sender`.
pub async fn forward(
    mut reply: ReplyStream<'_>,
    sender: &ChunkSender,
    options: ForwardOptions,
) -> ForwardOutcome {
    loop {
        let event = tokio::select! {
            biased;
            _ = sender.closed() => {
                info!("client disconnected, abandoning reply");
                return ForwardOutcome::Disconnected;
            }
            event = reply.next() => event,
        };

        let chunk = match event {
            None => {
                debug!("reply complete");
                return ForwardOutcome::Completed;
            }
            Some(Ok(ReplyEvent::Text(text))) | Some(Ok(ReplyEvent::Fallback(text))) => text,
            Some(Ok(ReplyEvent::Status(status))) if options.announce_tools => status,
            Some(Ok(ReplyEvent::Status(_))) => continue,
            Some(Err(e)) => {
                error!(error = %e, "reply failed");
                let marker = format!("{}{}", ERROR_MARKER, e.user_message());
                if sender.send(marker).await.is_err() {
                    return ForwardOutcome::Disconnected;
                }
                return ForwardOutcome::Failed;
            }
        };

        if chunk.is_empty() {
            continue;
        }
        if sender.send(chunk).await.is_err() {
            info!("client disconnected, abandoning reply");
            return ForwardOutcome::Disconnected;
        }
    }
}
