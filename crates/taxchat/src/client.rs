//! Client side of `POST /api/chat`
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::Serialize;

use crate::errors::ChatError;
use crate::models::message::Message;
use crate::protocol::{DataStreamDecoder, StreamPart};
use crate::providers::base::TextStream;
use crate::providers::utils::{check_status, streaming_client};

/// Path of the chat endpoint on the server
pub const CHAT_PATH: &str = "/api/chat";

/// Reported when the body ends without a finish part
pub const UNFINISHED_STREAM: &str = "stream ended before finish";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

/// Opens a streamed reply for a whole conversation
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, messages: Vec<Message>) -> Result<TextStream>;
}

/// Talks to a taxchat server over HTTP and decodes its data stream
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        Ok(Self {
            client: streaming_client()?,
            base_url: base_url.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CHAT_PATH)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, messages: Vec<Message>) -> Result<TextStream> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-protocol", "data")
            .json(&ChatRequest {
                messages: &messages,
            })
            .send()
            .await?;
        let response = check_status(response).await?;

        let mut body = response.bytes_stream();
        Ok(Box::pin(async_stream::try_stream! {
            let mut decoder = DataStreamDecoder::new();
            let mut finished = false;

            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                for part in decoder.push(&chunk)? {
                    match part {
                        StreamPart::Text(text) => {
                            if !text.is_empty() {
                                yield text;
                            }
                        }
                        StreamPart::Error(message) => {
                            Err::<(), _>(ChatError::Stream(message))?;
                        }
                        StreamPart::Finish(_) => finished = true,
                    }
                }
                if finished {
                    break;
                }
            }

            if !finished {
                match decoder.finish()? {
                    Some(StreamPart::Text(text)) => {
                        yield text;
                    }
                    Some(StreamPart::Error(message)) => {
                        Err::<(), _>(ChatError::Stream(message))?;
                    }
                    Some(StreamPart::Finish(_)) => finished = true,
                    None => {}
                }
            }

            if !finished {
                Err::<(), _>(ChatError::Stream(UNFINISHED_STREAM.to_string()))?;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolFormatter;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: String) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(header("x-protocol", "data"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/plain"))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_open_decodes_text() -> Result<()> {
        let body = [
            ProtocolFormatter::format_text("Hi! How can I help "),
            ProtocolFormatter::format_text("with your taxes?"),
            ProtocolFormatter::format_finish("stop"),
        ]
        .concat();
        let server = serve(body).await;

        let transport = HttpTransport::new(server.uri())?;
        let fragments: Vec<String> = transport
            .open(vec![Message::user().with_text("hello")])
            .await?
            .try_collect()
            .await?;
        assert_eq!(fragments.concat(), "Hi! How can I help with your taxes?");
        Ok(())
    }

    #[tokio::test]
    async fn test_open_surfaces_error_part() -> Result<()> {
        let body = [
            ProtocolFormatter::format_text("Partial"),
            ProtocolFormatter::format_error("An error occurred."),
        ]
        .concat();
        let server = serve(body).await;

        let transport = HttpTransport::new(server.uri())?;
        let mut stream = transport
            .open(vec![Message::user().with_text("hello")])
            .await?;
        assert_eq!(stream.next().await.transpose()?, Some("Partial".to_string()));
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChatError>(),
            Some(&ChatError::Stream("An error occurred.".to_string()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_open_requires_finish_part() -> Result<()> {
        let server = serve(ProtocolFormatter::format_text("The standard ded")).await;

        let transport = HttpTransport::new(server.uri())?;
        let mut stream = transport
            .open(vec![Message::user().with_text("hello")])
            .await?;
        assert_eq!(
            stream.next().await.transpose()?,
            Some("The standard ded".to_string())
        );
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChatError>(),
            Some(&ChatError::Stream(UNFINISHED_STREAM.to_string()))
        );
        assert!(stream.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_open_surfaces_malformed_line() -> Result<()> {
        let body = [
            "0:not json\n".to_string(),
            ProtocolFormatter::format_finish("stop"),
        ]
        .concat();
        let server = serve(body).await;

        let transport = HttpTransport::new(server.uri())?;
        let mut stream = transport
            .open(vec![Message::user().with_text("hello")])
            .await?;
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::Decode(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_open_fails_on_status() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/", server.uri()))?;
        assert!(transport
            .open(vec![Message::user().with_text("hi")])
            .await
            .is_err());
        Ok(())
    }
}
