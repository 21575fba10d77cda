//! Picks the upstream model for a turn and opens its completion stream
use anyhow::Result;
use serde::Serialize;
use strum_macros::Display;

use crate::models::message::Message;
use crate::providers::base::{Provider, TextStream};

/// Instruction prepended to every conversation, whichever model answers it
pub const SYSTEM_PROMPT: &str = "Pretend you are an accountant. You will answer questions about \
    W-2 forms, standard deductions, filing statuses, etc.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelChoice {
    /// General-purpose chat model
    General,
    /// Model able to read PDF documents
    Document,
}

/// Choose the model for a conversation
///
/// A PDF anywhere in the history keeps the document model in charge for the
/// rest of the conversation, even on turns without attachments.
pub fn select_model(messages: &[Message]) -> ModelChoice {
    if messages.iter().any(Message::has_pdf) {
        ModelChoice::Document
    } else {
        ModelChoice::General
    }
}

/// Routes each conversation to one of two providers
pub struct ModelRouter {
    general: Box<dyn Provider>,
    document: Box<dyn Provider>,
}

impl ModelRouter {
    pub fn new(general: Box<dyn Provider>, document: Box<dyn Provider>) -> Self {
        Self { general, document }
    }

    pub fn provider(&self, choice: ModelChoice) -> &dyn Provider {
        match choice {
            ModelChoice::General => self.general.as_ref(),
            ModelChoice::Document => self.document.as_ref(),
        }
    }

    /// Stream the reply to the latest turn from whichever model the history calls for
    pub async fn reply(&self, messages: &[Message]) -> Result<(ModelChoice, TextStream)> {
        let choice = select_model(messages);
        let provider = self.provider(choice);
        tracing::info!(
            model = provider.model(),
            choice = %choice,
            messages = messages.len(),
            "routing conversation"
        );
        let stream = provider.stream(SYSTEM_PROMPT, messages).await?;
        Ok((choice, stream))
    }
}
