//! These models represent the objects passed between the chat page, the server and the LLMs
//!
//! There are several different related formats we need to interact with:
//! - useChat messages with experimental attachments, sent from the client to the server
//! - data stream protocol parts, sent from the server back to the client
//! - openai chat completion messages, sent from the server to the general-purpose model
//! - anthropic messages, sent from the server to the document-capable model
//!
//! The client format is the one we keep internally, since the whole conversation travels
//! with every request. Provider formats are produced on the way out by the providers.
pub mod attachment;
pub mod message;
pub mod role;
