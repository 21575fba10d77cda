use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::providers::base::{Provider, TextStream};

/// A mock provider that streams pre-configured fragments for testing
pub struct MockProvider {
    model: String,
    fragments: Vec<String>,
    fail: bool,
    calls: Arc<Mutex<Vec<(String, Vec<Message>)>>>,
}

impl MockProvider {
    /// Create a new mock provider that streams the given fragments on every call
    pub fn new<S: Into<String>>(model: S, fragments: &[&str]) -> Self {
        Self {
            model: model.into(),
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A provider whose requests are refused before any fragment is sent
    pub fn failing<S: Into<String>>(model: S) -> Self {
        Self {
            fail: true,
            ..Self::new(model, &[])
        }
    }

    /// Shared record of (system prompt, messages) for each call
    pub fn calls(&self) -> Arc<Mutex<Vec<(String, Vec<Message>)>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<TextStream> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), messages.to_vec()));
        if self.fail {
            return Err(anyhow!("mock provider refused the request"));
        }
        let fragments: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}
