use std::io::{self, Write};

use anyhow::Result;
use cliclack::{input, spinner};
use console::style;
use taxchat::session::{Notifier, NotifyLevel};

use super::{parse_input, print_help, Input, Prompt};

pub struct CliclackPrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: spinner(),
            busy: false,
        }
    }
}

impl Prompt for CliclackPrompt {
    fn show_busy(&mut self) {
        if !self.busy {
            self.spinner = spinner();
            self.spinner.start("Thinking...");
            self.busy = true;
        }
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }

    fn render_delta(&mut self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }

    fn render_reply_end(&mut self) {
        println!();
        println!();
    }

    fn render_pending(&self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        let _ = cliclack::log::info(format!("Attached: {}", names.join(", ")));
    }

    fn render_quick_replies(&self, replies: &[&str]) {
        println!("{}", style("Suggestions (/q <n>):").dim());
        for (i, reply) in replies.iter().enumerate() {
            println!("  {} {}", style(format!("{}.", i + 1)).cyan(), reply);
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let message_text: String = input("Tax Chat:         [Help: /?]")
            .placeholder("")
            .required(false)
            .interact()?;

        match parse_input(&message_text) {
            Input::Help => {
                print_help();
                self.get_input()
            }
            Input::AskAgain => self.get_input(),
            other => Ok(other),
        }
    }

    fn close(&self) {
        // No cleanup required
    }
}

/// Surfaces session notices as cliclack log lines
pub struct CliclackNotifier;

impl Notifier for CliclackNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        let _ = match level {
            NotifyLevel::Info => cliclack::log::info(message),
            NotifyLevel::Warning => cliclack::log::warning(message),
            NotifyLevel::Error => cliclack::log::error(message),
        };
    }
}
