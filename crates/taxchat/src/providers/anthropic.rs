use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::base::{Provider, TextStream};
use super::configs::AnthropicProviderConfig;
use super::utils::{check_status, messages_to_anthropic_spec, sse_data, streaming_client};
use crate::models::message::Message;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

/// What a single streamed event means for the text we hand back
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Text(String),
    Skip,
    Stop,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = streaming_client()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message]) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_anthropic_spec(messages)?,
            "max_tokens": self.config.max_tokens.unwrap_or(4096),
            "stream": true
        });

        if let Some(object) = payload.as_object_mut() {
            if !system.is_empty() {
                object.insert("system".to_string(), json!(system));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
        }

        Ok(payload)
    }

    fn parse_event(data: &str) -> Result<StreamEvent> {
        let event: Value = serde_json::from_str(data)?;
        match event["type"].as_str() {
            Some("content_block_delta") => {
                match event["delta"]["text"].as_str() {
                    Some(text) if event["delta"]["type"] == "text_delta" => {
                        Ok(StreamEvent::Text(text.to_string()))
                    }
                    _ => Ok(StreamEvent::Skip),
                }
            }
            Some("message_stop") => Ok(StreamEvent::Stop),
            Some("error") => Err(anyhow!("Anthropic API error: {}", event["error"])),
            _ => Ok(StreamEvent::Skip),
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<TextStream> {
        let payload = self.build_payload(system, messages)?;
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut events = sse_data(response);
        Ok(Box::pin(async_stream::try_stream! {
            while let Some(data) = events.next().await {
                match Self::parse_event(&data?)? {
                    StreamEvent::Text(text) => {
                        if !text.is_empty() {
                            yield text;
                        }
                    }
                    StreamEvent::Skip => continue,
                    StreamEvent::Stop => break,
                }
            }
        }))
    }
}
