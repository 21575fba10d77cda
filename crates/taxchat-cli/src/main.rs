use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use taxchat::client::HttpTransport;
use taxchat::session::ChatSession;

mod chat;
mod inputs;
mod prompt;

use chat::Chat;
use prompt::cliclack::{CliclackNotifier, CliclackPrompt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the taxchatd server
    #[arg(short, long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .init();

    let cli = Cli::parse();

    let transport = HttpTransport::new(cli.server)?;
    tracing::info!("chatting with {}", transport.endpoint());
    let session = ChatSession::new(Arc::new(transport), Arc::new(CliclackNotifier));
    let mut chat = Chat::new(session, Box::new(CliclackPrompt::new()));

    match cli.message {
        Some(message) => chat.headless_start(message).await,
        None => chat.start().await,
    }
}
