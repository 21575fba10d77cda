use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::Deserialize;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use taxchat::{
    client::CHAT_PATH,
    models::message::Message,
    protocol::{ProtocolFormatter, STREAM_HEADER, STREAM_VERSION},
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;

/// What the client sees when the upstream model fails; details stay in the logs
const UPSTREAM_ERROR: &str = "An error occurred.";

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<Message>,
}

// Streaming response body speaking the data stream protocol
pub struct DataStreamResponse {
    rx: ReceiverStream<String>,
}

impl DataStreamResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for DataStreamResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for DataStreamResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::HeaderName::from_static(STREAM_HEADER), STREAM_VERSION),
            ],
            body,
        )
            .into_response()
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<DataStreamResponse, StatusCode> {
    // Check protocol header (optional in our case)
    if let Some(protocol) = headers.get("x-protocol") {
        if protocol.to_str().map(|p| p != "data").unwrap_or(true) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    if request.messages.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let router = state.router.clone();
    let messages = request.messages;

    // Spawn task to handle streaming
    tokio::spawn(async move {
        let mut stream = match router.reply(&messages).await {
            Ok((_, stream)) => stream,
            Err(e) => {
                tracing::error!("Failed to start reply stream: {}", e);
                let _ = tx.send(ProtocolFormatter::format_error(UPSTREAM_ERROR)).await;
                return;
            }
        };

        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(Ok(text))) => {
                    if let Err(e) = tx.send(ProtocolFormatter::format_text(&text)).await {
                        tracing::info!("Client went away mid-reply: {}", e);
                        return;
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("Error streaming reply: {}", e);
                    let _ = tx.send(ProtocolFormatter::format_error(UPSTREAM_ERROR)).await;
                    return;
                }
                Ok(None) => {
                    break;
                }
                Err(_) => {
                    // Heartbeat, used to stop pulling from the model once the client disconnects
                    if tx.is_closed() {
                        tracing::info!("Client disconnected, dropping reply stream");
                        return;
                    }
                    continue;
                }
            }
        }

        // Send finish message
        let _ = tx.send(ProtocolFormatter::format_finish("stop")).await;
    });

    Ok(DataStreamResponse::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(CHAT_PATH, post(handler))
        .with_state(state)
}
