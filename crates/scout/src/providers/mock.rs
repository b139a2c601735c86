use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderEvent, ProviderStream};

/// A mock provider that replays pre-configured replies for testing, one per call
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Vec<ProviderEvent>>>>,
    transcripts: Arc<Mutex<Vec<Vec<Message>>>>,
    calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new(responses: Vec<Vec<ProviderEvent>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            transcripts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The transcript passed on each call so far
    pub fn transcripts(&self) -> Vec<Vec<Message>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> ProviderResult<ProviderStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::Api("no more scripted responses".to_string()));
        }
        let events = responses.remove(0);
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
