use anyhow::{anyhow, Result};
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use crate::errors::ChatError;
use crate::models::attachment::Attachment;
use crate::models::message::Message;

/// HTTP client for streamed replies
///
/// Carries no total timeout: reqwest would count the whole body against it and cut
/// long replies off mid-stream.
pub fn streaming_client() -> Result<Client> {
    Ok(Client::builder().build()?)
}

/// Fail on anything but a 200, carrying the upstream body so the cause is visible in logs
pub async fn check_status(response: Response) -> Result<Response> {
    match response.status() {
        StatusCode::OK => Ok(response),
        status => {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            Err(ChatError::Status {
                status: status.as_u16(),
                body,
            }
            .into())
        }
    }
}

/// The payloads of the `data:` lines of a server-sent event stream, in order
pub fn sse_data(response: Response) -> BoxStream<'static, Result<String>> {
    Box::pin(async_stream::try_stream! {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                let line = String::from_utf8_lossy(&line[..newline_pos]);
                if let Some(data) = line.trim().strip_prefix("data:") {
                    yield data.trim_start().to_string();
                }
            }
        }
    })
}

/// Convert an attachment into an OpenAI chat completion content part
pub fn attachment_to_openai_part(attachment: &Attachment) -> Result<Value> {
    if attachment.is_image() {
        Ok(json!({
            "type": "image_url",
            "image_url": { "url": attachment.url }
        }))
    } else if attachment.is_pdf() {
        Ok(json!({
            "type": "file",
            "file": {
                "filename": attachment.name.clone().unwrap_or_else(|| "document.pdf".to_string()),
                "file_data": attachment.url,
            }
        }))
    } else if attachment.is_text() {
        Ok(json!({ "type": "text", "text": attachment.text()? }))
    } else {
        Err(anyhow!(
            "Unsupported attachment type: {}",
            attachment.content_type
        ))
    }
}

/// Convert an attachment into an Anthropic content block
pub fn attachment_to_anthropic_block(attachment: &Attachment) -> Result<Value> {
    if attachment.is_image() {
        Ok(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": attachment.content_type,
                "data": attachment.base64_data()?,
            }
        }))
    } else if attachment.is_pdf() {
        Ok(json!({
            "type": "document",
            "source": {
                "type": "base64",
                "media_type": attachment.content_type,
                "data": attachment.base64_data()?,
            }
        }))
    } else if attachment.is_text() {
        Ok(json!({ "type": "text", "text": attachment.text()? }))
    } else {
        Err(anyhow!(
            "Unsupported attachment type: {}",
            attachment.content_type
        ))
    }
}

/// Convert internal messages to OpenAI's API message specification
///
/// Messages without attachments keep the plain string content; attachments turn
/// the content into a list of parts with the text first.
pub fn messages_to_openai_spec(messages: &[Message]) -> Result<Vec<Value>> {
    let mut messages_spec = Vec::new();

    for message in messages {
        if message.attachments.is_empty() {
            messages_spec.push(json!({
                "role": message.role,
                "content": message.content,
            }));
            continue;
        }

        let mut parts = Vec::new();
        if !message.content.is_empty() {
            parts.push(json!({ "type": "text", "text": message.content }));
        }
        for attachment in &message.attachments {
            parts.push(attachment_to_openai_part(attachment)?);
        }
        messages_spec.push(json!({
            "role": message.role,
            "content": parts,
        }));
    }

    Ok(messages_spec)
}

/// Convert internal messages to Anthropic's API message specification
///
/// Attachments come before the text, which is where Anthropic recommends
/// placing documents and images.
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Result<Vec<Value>> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut blocks = Vec::new();
        for attachment in &message.attachments {
            blocks.push(attachment_to_anthropic_block(attachment)?);
        }
        if !message.content.is_empty() {
            blocks.push(json!({ "type": "text", "text": message.content }));
        }
        if blocks.is_empty() {
            // Anthropic rejects empty content, so skip messages with nothing to say
            continue;
        }
        messages_spec.push(json!({
            "role": message.role,
            "content": blocks,
        }));
    }

    Ok(messages_spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attachment::PDF_CONTENT_TYPE;
    use futures::TryStreamExt;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_streaming_client_waits_for_slow_reply() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(1500))
                    .set_body_raw("data: one\n\ndata: two\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let response = streaming_client()?.post(server.uri()).send().await?;
        let data: Vec<String> = sse_data(check_status(response).await?).try_collect().await?;
        assert_eq!(data, vec!["one".to_string(), "two".to_string()]);
        Ok(())
    }

    #[test]
    fn test_openai_plain_text_message() -> Result<()> {
        let messages = vec![
            Message::user().with_text("hello"),
            Message::assistant().with_text("Hi!"),
        ];
        let spec = messages_to_openai_spec(&messages)?;
        assert_eq!(spec[0], json!({"role": "user", "content": "hello"}));
        assert_eq!(spec[1], json!({"role": "assistant", "content": "Hi!"}));
        Ok(())
    }

    #[test]
    fn test_openai_attachments_become_parts() -> Result<()> {
        let message = Message::user()
            .with_text("What is on this form?")
            .with_attachment(Attachment::from_bytes(None, "image/png", b"png"))
            .with_attachment(Attachment::from_bytes(None, "text/plain", b"box 1: 50000"));
        let spec = messages_to_openai_spec(&[message])?;
        let parts = spec[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "What is on this form?");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,cG5n");
        assert_eq!(parts[2], json!({"type": "text", "text": "box 1: 50000"}));
        Ok(())
    }

    #[test]
    fn test_anthropic_pdf_becomes_document() -> Result<()> {
        let message = Message::user()
            .with_text("Summarize my W-2")
            .with_attachment(Attachment::from_bytes(
                Some("w2.pdf".into()),
                PDF_CONTENT_TYPE,
                b"%PDF",
            ));
        let spec = messages_to_anthropic_spec(&[message])?;
        let blocks = spec[0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "document");
        assert_eq!(blocks[0]["source"]["media_type"], "application/pdf");
        assert_eq!(blocks[0]["source"]["data"], "JVBERg==");
        assert_eq!(blocks[1], json!({"type": "text", "text": "Summarize my W-2"}));
        Ok(())
    }

    #[test]
    fn test_anthropic_skips_empty_messages() -> Result<()> {
        let spec = messages_to_anthropic_spec(&[
            Message::user().with_text("hi"),
            Message::assistant(),
        ])?;
        assert_eq!(spec.len(), 1);
        Ok(())
    }

    #[test]
    fn test_unsupported_attachment() {
        let attachment = Attachment::from_bytes(None, "application/zip", b"PK");
        assert!(attachment_to_openai_part(&attachment).is_err());
        assert!(attachment_to_anthropic_block(&attachment).is_err());
    }
}
