//! Client-side chat session: the conversation, the input buffer, pending attachments
//! and the lifecycle of the one request that may be in flight.
//!
//! Networking runs in a spawned task that forwards [`StreamEvent`]s over a channel;
//! the session applies them in arrival order and reports each change as an
//! [`Update`] so the interface can render it and scroll to the newest message.
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::attachments::{self, AttachmentSource};
use crate::client::ChatTransport;
use crate::models::attachment::Attachment;
use crate::models::message::Message;
use crate::models::role::Role;

/// Shown whenever a request fails, whatever the cause
pub const ERROR_NOTICE: &str = "An error has occurred. Please try again later.";

/// Suggested follow-ups offered under assistant messages
pub const SUGGESTED_REPLIES: [&str; 4] = [
    "How do tax brackets work?",
    "Tell me about deductions",
    "What is a W-2 form?",
    "What is the standard deduction?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Sending,
    Streaming,
    Done,
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotifyLevel {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget channel for user-visible notices
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel);
}

/// What the networking task reports back
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Chunk(String),
    Error(String),
    End,
}

/// A change to the session the interface should render
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// A user message was appended
    Submitted { message_id: String },
    /// The reply began and an empty assistant message was appended
    ReplyStarted { message_id: String },
    /// Text was appended to the assistant message
    ReplyDelta { message_id: String, text: String },
    /// The reply is complete and the message sealed
    ReplyFinished { message_id: String },
    /// The request failed; the conversation is left as it was
    Failed { error: String },
    /// The pending attachment set was replaced
    AttachmentsChanged { count: usize },
}

/// State of one request, kept after it ends so callers can inspect the outcome
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSession {
    pub id: u64,
    pub status: SessionStatus,
    pub partial: String,
    pub message_id: Option<String>,
}

#[derive(Clone)]
pub struct StreamDispatcher {
    tx: mpsc::UnboundedSender<(StreamEvent, u64)>,
}

impl StreamDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<(StreamEvent, u64)>) -> Self {
        Self { tx }
    }

    /// Open the reply stream in the background and forward its fragments
    ///
    /// The task stops early once the receiving session has been dropped.
    pub fn spawn(
        &self,
        transport: Arc<dyn ChatTransport>,
        messages: Vec<Message>,
        stream_id: u64,
    ) -> JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut stream = match transport.open(messages).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send((StreamEvent::Error(e.to_string()), stream_id));
                    return;
                }
            };

            while let Some(fragment) = stream.next().await {
                match fragment {
                    Ok(text) => {
                        if tx.send((StreamEvent::Chunk(text), stream_id)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send((StreamEvent::Error(e.to_string()), stream_id));
                        return;
                    }
                }
            }

            let _ = tx.send((StreamEvent::End, stream_id));
        })
    }
}

/// Whichever happens first while a reply is in flight
enum Wake {
    Event(Option<(StreamEvent, u64)>),
    TaskEnded(Result<(), JoinError>),
}

async fn join_task(task: &mut Option<JoinHandle<()>>) -> Result<(), JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

pub struct ChatSession {
    conversation: Vec<Message>,
    input: String,
    pending: Vec<Attachment>,
    stream: Option<StreamSession>,
    next_stream_id: u64,
    transport: Arc<dyn ChatTransport>,
    notifier: Arc<dyn Notifier>,
    dispatcher: StreamDispatcher,
    events: mpsc::UnboundedReceiver<(StreamEvent, u64)>,
    task: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, notifier: Arc<dyn Notifier>) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            conversation: Vec::new(),
            input: String::new(),
            pending: Vec::new(),
            stream: None,
            next_stream_id: 0,
            transport,
            notifier,
            dispatcher: StreamDispatcher::new(tx),
            events,
            task: None,
        }
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input<S: Into<String>>(&mut self, input: S) {
        self.input = input.into();
    }

    pub fn pending_attachments(&self) -> &[Attachment] {
        &self.pending
    }

    /// The request in flight, or the last one to finish
    pub fn last_stream(&self) -> Option<&StreamSession> {
        self.stream.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        match &self.stream {
            Some(stream)
                if matches!(
                    stream.status,
                    SessionStatus::Sending | SessionStatus::Streaming
                ) =>
            {
                stream.status
            }
            _ => SessionStatus::Idle,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status() != SessionStatus::Idle
    }

    /// Waiting on the first fragment of a reply
    pub fn is_thinking(&self) -> bool {
        self.status() == SessionStatus::Sending
            && self
                .conversation
                .last()
                .is_some_and(|message| message.role != Role::Assistant)
    }

    /// Quick replies are offered once the assistant has the last word
    pub fn quick_replies_enabled(&self) -> bool {
        !self.is_busy()
            && self
                .conversation
                .last()
                .is_some_and(|message| message.role == Role::Assistant)
    }

    /// Validate and stage a batch of files for the next submit
    ///
    /// The whole batch is rejected if any file fails the source's allow-list, in
    /// which case the staged set is left untouched.
    pub fn attach_files(&mut self, files: Vec<Attachment>, source: AttachmentSource) -> Option<Update> {
        if files.is_empty() {
            return None;
        }

        let content_types = files.iter().map(|file| file.content_type.as_str());
        if let Err(err) = attachments::validate(content_types, source) {
            tracing::warn!(source = %source, "rejected attachments: {:?}", err);
            self.notifier.notify(&err.to_string(), NotifyLevel::Error);
            return None;
        }

        self.pending = files;
        Some(Update::AttachmentsChanged {
            count: self.pending.len(),
        })
    }

    /// Send a user turn with the given attachments
    ///
    /// Ignored unless idle, and ignored when there is neither text nor an attachment.
    pub fn submit<S: Into<String>>(&mut self, text: S, attachments: Vec<Attachment>) -> Option<Update> {
        let text = text.into();
        if self.is_busy() {
            tracing::debug!("submit ignored while a reply is in flight");
            return None;
        }
        if text.trim().is_empty() && attachments.is_empty() {
            return None;
        }

        let message = Message::user().with_text(text).with_attachments(attachments);
        let message_id = message.id.clone();
        self.conversation.push(message);
        self.input.clear();
        self.pending.clear();

        self.next_stream_id += 1;
        let stream_id = self.next_stream_id;
        self.stream = Some(StreamSession {
            id: stream_id,
            status: SessionStatus::Sending,
            partial: String::new(),
            message_id: None,
        });
        self.task = Some(self.dispatcher.spawn(
            self.transport.clone(),
            self.conversation.clone(),
            stream_id,
        ));

        Some(Update::Submitted { message_id })
    }

    /// Submit whatever is in the input buffer together with the staged attachments
    pub fn submit_input(&mut self) -> Option<Update> {
        if self.is_busy() {
            return None;
        }
        let text = self.input.clone();
        let attachments = self.pending.clone();
        self.submit(text, attachments)
    }

    /// Put a suggested reply in the input and send it without attachments
    pub fn select_quick_reply(&mut self, text: &str) -> Option<Update> {
        if !self.quick_replies_enabled() {
            return None;
        }
        self.set_input(text);
        self.submit(text, Vec::new())
    }

    /// Wait for the next change caused by the request in flight
    ///
    /// Returns `None` straight away when nothing is in flight.
    pub async fn next_update(&mut self) -> Option<Update> {
        while self.is_busy() {
            let wake = {
                let events = &mut self.events;
                let task = &mut self.task;
                // Events queued by the task are drained before its exit is looked at
                tokio::select! {
                    biased;
                    event = events.recv() => Wake::Event(event),
                    joined = join_task(task) => Wake::TaskEnded(joined),
                }
            };

            match wake {
                Wake::Event(event) => {
                    let (event, stream_id) = event?;
                    if let Some(update) = self.handle_stream_event(event, stream_id) {
                        return Some(update);
                    }
                }
                Wake::TaskEnded(joined) => {
                    self.task = None;
                    let stream_id = self.stream.as_ref()?.id;
                    let error = match joined {
                        Err(e) if e.is_panic() => "reply task panicked".to_string(),
                        Err(e) => format!("reply task failed: {}", e),
                        Ok(()) => "reply task ended before the stream did".to_string(),
                    };
                    if let Some(update) =
                        self.handle_stream_event(StreamEvent::Error(error), stream_id)
                    {
                        return Some(update);
                    }
                }
            }
        }
        None
    }

    /// Drive the request in flight to completion, collecting every update
    pub async fn run_until_idle(&mut self) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update);
        }
        updates
    }

    /// Apply one event from the networking task
    ///
    /// Events belonging to an earlier request are dropped.
    pub fn handle_stream_event(&mut self, event: StreamEvent, stream_id: u64) -> Option<Update> {
        let stream = match self.stream.as_mut() {
            Some(stream)
                if stream.id == stream_id
                    && matches!(
                        stream.status,
                        SessionStatus::Sending | SessionStatus::Streaming
                    ) =>
            {
                stream
            }
            _ => {
                tracing::debug!(stream_id, "dropping event for a finished stream");
                return None;
            }
        };

        match event {
            StreamEvent::Chunk(text) => {
                if stream.status == SessionStatus::Sending {
                    let message = Message::assistant();
                    let message_id = message.id.clone();
                    self.conversation.push(message);
                    stream.status = SessionStatus::Streaming;
                    stream.message_id = Some(message_id.clone());
                    if text.is_empty() {
                        return Some(Update::ReplyStarted { message_id });
                    }
                }

                stream.partial.push_str(&text);
                let message_id = stream.message_id.clone()?;
                if let Some(message) = self.conversation.last_mut() {
                    message.content.clone_from(&stream.partial);
                }
                Some(Update::ReplyDelta { message_id, text })
            }
            StreamEvent::End => {
                let message_id = match stream.message_id.clone() {
                    Some(message_id) => message_id,
                    None => {
                        // Nothing was streamed; still close the turn with an empty reply
                        let message = Message::assistant();
                        let message_id = message.id.clone();
                        self.conversation.push(message);
                        stream.message_id = Some(message_id.clone());
                        message_id
                    }
                };
                stream.status = SessionStatus::Done;
                Some(Update::ReplyFinished { message_id })
            }
            StreamEvent::Error(error) => {
                tracing::error!(stream_id, "chat stream failed: {}", error);
                stream.status = SessionStatus::Errored;
                self.notifier.notify(ERROR_NOTICE, NotifyLevel::Error);
                Some(Update::Failed { error })
            }
        }
    }
}
