use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::message::Message;

/// Text fragments of a completion, in the order the model produced them
///
/// The stream is lazy and can only be read forward once; a failed fragment
/// ends the completion.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Base trait for AI providers (OpenAI, Anthropic, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// The model this provider completes with
    fn model(&self) -> &str;

    /// Start streaming a completion for the conversation under the given system prompt
    ///
    /// Errors while opening the request are returned directly; errors after the
    /// first fragment arrive through the stream.
    async fn stream(&self, system: &str, messages: &[Message]) -> Result<TextStream>;
}
