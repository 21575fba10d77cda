pub mod attachments;
pub mod client;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod providers;
pub mod router;
pub mod session;
