use anyhow::Result;
use std::path::PathBuf;
use taxchat::attachments::AttachmentSource;

pub mod cliclack;

pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    /// Print streamed reply text as it arrives
    fn render_delta(&mut self, text: &str);
    fn render_reply_end(&mut self);
    fn render_pending(&self, names: &[String]);
    fn render_quick_replies(&self, replies: &[&str]);
    fn close(&self);
    fn ready(&self) {
        println!("\n");
        println!("Ask anything about W-2 forms, deductions or filing status. Type /? for help.");
        println!("\n");
    }
}

#[derive(Debug, PartialEq)]
pub enum Input {
    AskAgain, // Ask the user for input again. Control flow command.
    Message(String),
    Attach {
        source: AttachmentSource,
        paths: Vec<PathBuf>,
    },
    QuickReply(usize),
    Help,
    Exit,
}

/// Interpret a line typed at the prompt
///
/// Commands are matched on the trimmed line; a message keeps the text as typed.
pub fn parse_input(text: &str) -> Input {
    let trimmed = text.trim();
    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let source = match command.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => return Input::Exit,
        "/?" | "/help" => return Input::Help,
        "/q" => {
            return match rest.parse::<usize>() {
                Ok(n) if n >= 1 => Input::QuickReply(n - 1),
                _ => Input::AskAgain,
            }
        }
        "/attach" => AttachmentSource::Dialog,
        "/drop" => AttachmentSource::Drop,
        "/paste" => AttachmentSource::Paste,
        _ => return Input::Message(text.to_string()),
    };

    let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
    if paths.is_empty() {
        Input::AskAgain
    } else {
        Input::Attach { source, paths }
    }
}

pub fn print_help() {
    println!("Commands:");
    println!("/attach <files> - Attach images or text files, as through the upload button");
    println!("/drop <files> - Attach files as if dropped onto the chat");
    println!("/paste <files> - Attach files as if pasted into the input");
    println!("/q <n> - Send suggested reply number n");
    println!("/exit - Exit the session");
    println!("/? - Display this help message");
    println!("An empty message sends the attached files on their own.");
}
