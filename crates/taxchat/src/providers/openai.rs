use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use super::base::{Provider, TextStream};
use super::configs::OpenAiProviderConfig;
use super::utils::{check_status, messages_to_openai_spec, sse_data, streaming_client};
use crate::models::message::Message;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = streaming_client()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        // create messages array with system message first
        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages)?);

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true
        });

        if let Some(object) = payload.as_object_mut() {
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
            if let Some(tokens) = self.config.max_tokens {
                object.insert("max_tokens".to_string(), json!(tokens));
            }
        }

        Ok(payload)
    }

    /// Pull the text out of one streamed chunk, `None` when the stream is done
    fn parse_event(data: &str) -> Result<Option<String>> {
        if data == "[DONE]" {
            return Ok(None);
        }

        let event: Value = serde_json::from_str(data)?;
        if let Some(error) = event.get("error") {
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let text = event["choices"][0]["delta"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Some(text))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream(&self, system: &str, messages: &[Message]) -> Result<TextStream> {
        let payload = self.build_payload(system, messages)?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut events = sse_data(response);
        Ok(Box::pin(async_stream::try_stream! {
            while let Some(data) = events.next().await {
                match Self::parse_event(&data?)? {
                    Some(text) if !text.is_empty() => {
                        yield text;
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
        }))
    }
}
