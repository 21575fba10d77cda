use super::attachment::Attachment;
use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fresh identifier for a message, stable for the lifetime of the session
pub fn generate_id() -> String {
    nanoid::nanoid!()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A message to or from the assistant, in the shape the chat page sends it
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "experimental_attachments",
        alias = "attachments",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attachments: Vec<Attachment>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            id: generate_id(),
            role,
            content: String::new(),
            created_at: Some(Utc::now()),
            attachments: Vec::new(),
        }
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Set the text content of the message
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = text.into();
        self
    }

    /// Add an attachment to the message
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add several attachments to the message, keeping their order
    pub fn with_attachments<I: IntoIterator<Item = Attachment>>(mut self, attachments: I) -> Self {
        self.attachments.extend(attachments);
        self
    }

    pub fn has_pdf(&self) -> bool {
        self.attachments.iter().any(Attachment::is_pdf)
    }
}
