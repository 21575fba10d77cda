use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Content type that forces the conversation onto the document-capable model
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Number of characters shown in a text attachment preview
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A file attached to a single message, identified by its declared content type
///
/// The payload travels inline as a `data:` url so the whole conversation can be
/// replayed to the server on every turn.
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content_type: String,
    pub url: String,
}

impl Attachment {
    /// Build an attachment from raw bytes, encoding them as a base64 data url
    pub fn from_bytes<T: Into<String>>(name: Option<String>, content_type: T, data: &[u8]) -> Self {
        let content_type = content_type.into();
        let url = format!("data:{};base64,{}", content_type, STANDARD.encode(data));
        Self {
            name,
            content_type,
            url,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type == PDF_CONTENT_TYPE
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/")
    }

    /// The base64 part of the data url
    pub fn base64_data(&self) -> Result<&str> {
        let (header, data) = self
            .url
            .split_once(',')
            .ok_or_else(|| anyhow!("Attachment url is not a data url"))?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(anyhow!("Unsupported attachment url: {}", header));
        }
        Ok(data)
    }

    /// Decode the payload of the data url
    pub fn data(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(self.base64_data()?)?)
    }

    /// Decode the payload as UTF-8 text, replacing invalid sequences
    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.data()?).into_owned())
    }

    /// Short preview of a text attachment: the first hundred characters, with an
    /// ellipsis once the content reaches that length
    pub fn text_preview(&self) -> Result<String> {
        let text = self.text()?;
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if preview.chars().count() >= PREVIEW_CHARS {
            preview.push_str("...");
        }
        Ok(preview)
    }
}
