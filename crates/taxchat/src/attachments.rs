//! Allow-list checks for files entering the pending attachment set
//!
//! Each input surface has its own allow-list. Only the declared content type is
//! consulted; the file contents are never sniffed.
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// Where a batch of files came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttachmentSource {
    /// Pasted into the message input
    Paste,
    /// Dragged and dropped onto the conversation
    Drop,
    /// Picked through the upload button's file dialog
    Dialog,
}

impl AttachmentSource {
    /// Content type prefixes accepted from this source
    ///
    /// Paste also admits `pdf/`, which no real PDF carries (they are
    /// `application/pdf`). Kept as is until the intended rule is settled.
    pub fn allowed_prefixes(&self) -> &'static [&'static str] {
        match self {
            AttachmentSource::Paste => &["image/", "text/", "pdf/"],
            AttachmentSource::Drop | AttachmentSource::Dialog => &["image/", "text/"],
        }
    }

    /// The message shown when a batch from this source is rejected
    pub fn rejection_message(&self) -> &'static str {
        match self {
            AttachmentSource::Paste => "Please only submit text, image, or a pdf",
            AttachmentSource::Drop => "Only image and text files are allowed!",
            AttachmentSource::Dialog => "Only image and text files are allowed",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("{message}")]
    Rejected {
        origin: AttachmentSource,
        content_types: Vec<String>,
        message: &'static str,
    },
}

pub fn is_allowed(content_type: &str, source: AttachmentSource) -> bool {
    source
        .allowed_prefixes()
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// Validate a whole batch of declared content types; one bad file rejects them all
pub fn validate<'a, I>(content_types: I, source: AttachmentSource) -> Result<(), AttachmentError>
where
    I: IntoIterator<Item = &'a str>,
{
    let rejected: Vec<String> = content_types
        .into_iter()
        .filter(|content_type| !is_allowed(content_type, source))
        .map(String::from)
        .collect();

    if rejected.is_empty() {
        Ok(())
    } else {
        Err(AttachmentError::Rejected {
            origin: source,
            content_types: rejected,
            message: source.rejection_message(),
        })
    }
}
