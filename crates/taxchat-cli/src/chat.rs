use anyhow::Result;
use console::style;
use taxchat::session::{ChatSession, Update, SUGGESTED_REPLIES};

use crate::inputs::read_attachment;
use crate::prompt::{Input, Prompt};

pub struct Chat<'a> {
    session: ChatSession,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Chat<'a> {
    pub fn new(session: ChatSession, prompt: Box<dyn Prompt + 'a>) -> Self {
        Chat { session, prompt }
    }

    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();

        loop {
            if self.session.quick_replies_enabled() {
                self.prompt.render_quick_replies(&SUGGESTED_REPLIES);
            }

            match self.prompt.get_input()? {
                Input::Message(text) => {
                    self.session.set_input(text);
                    if self.session.submit_input().is_some() {
                        self.await_reply().await;
                    }
                }
                Input::Attach { source, paths } => {
                    let mut files = Vec::with_capacity(paths.len());
                    for path in &paths {
                        match read_attachment(path) {
                            Ok(file) => files.push(file),
                            Err(e) => {
                                let _ = cliclack::log::error(e.to_string());
                            }
                        }
                    }
                    if files.len() != paths.len() {
                        continue;
                    }
                    if self.session.attach_files(files, source).is_some() {
                        self.render_pending();
                    }
                }
                Input::QuickReply(index) => match SUGGESTED_REPLIES.get(index) {
                    Some(reply) => {
                        if self.session.select_quick_reply(reply).is_some() {
                            self.await_reply().await;
                        }
                    }
                    None => {
                        let _ = cliclack::log::warning(format!(
                            "There are only {} suggestions",
                            SUGGESTED_REPLIES.len()
                        ));
                    }
                },
                Input::Exit => break,
                Input::Help | Input::AskAgain => continue,
            }
        }

        self.prompt.close();
        Ok(())
    }

    /// Send one message and print the reply, without prompting
    pub async fn headless_start(&mut self, initial_message: String) -> Result<()> {
        if self.session.submit(initial_message, Vec::new()).is_some() {
            self.await_reply().await;
        }
        Ok(())
    }

    async fn await_reply(&mut self) {
        self.prompt.show_busy();
        let mut started = false;

        while let Some(update) = self.session.next_update().await {
            match update {
                Update::ReplyStarted { .. } | Update::ReplyDelta { .. } if !started => {
                    self.prompt.hide_busy();
                    print!("{} ", style("Accountant:").green().bold());
                    started = true;
                    if let Update::ReplyDelta { text, .. } = update {
                        self.prompt.render_delta(&text);
                    }
                }
                Update::ReplyDelta { text, .. } => self.prompt.render_delta(&text),
                Update::ReplyFinished { .. } => {
                    self.prompt.hide_busy();
                    self.prompt.render_reply_end();
                }
                Update::Failed { .. } => {
                    self.prompt.hide_busy();
                    if started {
                        self.prompt.render_reply_end();
                    }
                }
                _ => {}
            }
        }

        self.prompt.hide_busy();
    }

    fn render_pending(&self) {
        let names: Vec<String> = self
            .session
            .pending_attachments()
            .iter()
            .map(|file| {
                let name = file.name.clone().unwrap_or_else(|| file.content_type.clone());
                match file.text_preview() {
                    Ok(preview) if file.is_text() => format!("{} ({})", name, preview),
                    _ => name,
                }
            })
            .collect();
        self.prompt.render_pending(&names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use taxchat::attachments::AttachmentSource;
    use taxchat::client::ChatTransport;
    use taxchat::models::message::Message;
    use taxchat::providers::base::TextStream;
    use taxchat::session::{Notifier, NotifyLevel};

    struct CannedTransport {
        fragments: Vec<&'static str>,
    }

    #[async_trait]
    impl ChatTransport for CannedTransport {
        async fn open(&self, _messages: Vec<Message>) -> anyhow::Result<TextStream> {
            if self.fragments.is_empty() {
                return Err(anyhow!("connection refused"));
            }
            let items: Vec<anyhow::Result<String>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    #[derive(Default)]
    struct Notices(Mutex<Vec<String>>);

    impl Notifier for Notices {
        fn notify(&self, message: &str, _level: NotifyLevel) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    /// Replays scripted input and records what would be printed
    #[derive(Default)]
    struct ScriptedPrompt {
        inputs: VecDeque<Input>,
        output: Arc<Mutex<String>>,
        pending: Arc<Mutex<Vec<String>>>,
    }

    impl Prompt for ScriptedPrompt {
        fn get_input(&mut self) -> Result<Input> {
            Ok(self.inputs.pop_front().unwrap_or(Input::Exit))
        }
        fn show_busy(&mut self) {}
        fn hide_busy(&mut self) {}
        fn render_delta(&mut self, text: &str) {
            self.output.lock().unwrap().push_str(text);
        }
        fn render_reply_end(&mut self) {
            self.output.lock().unwrap().push('\n');
        }
        fn render_pending(&self, names: &[String]) {
            *self.pending.lock().unwrap() = names.to_vec();
        }
        fn render_quick_replies(&self, _replies: &[&str]) {}
        fn close(&self) {}
        fn ready(&self) {}
    }

    fn session(fragments: Vec<&'static str>, notices: Arc<Notices>) -> ChatSession {
        ChatSession::new(Arc::new(CannedTransport { fragments }), notices)
    }

    #[tokio::test]
    async fn test_message_then_quick_reply() -> Result<()> {
        let prompt = ScriptedPrompt {
            inputs: VecDeque::from(vec![
                Input::Message("hello".to_string()),
                Input::QuickReply(2),
                Input::Exit,
            ]),
            ..Default::default()
        };
        let output = prompt.output.clone();
        let mut chat = Chat::new(
            session(vec!["Hi! ", "How can I help with your taxes?"], Arc::default()),
            Box::new(prompt),
        );

        chat.start().await?;

        let conversation = chat.session.conversation();
        assert_eq!(conversation.len(), 4);
        assert_eq!(conversation[2].content, "What is a W-2 form?");
        assert_eq!(
            output.lock().unwrap().as_str(),
            "Hi! How can I help with your taxes?\nHi! How can I help with your taxes?\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_message_is_sent_as_typed() -> Result<()> {
        let prompt = ScriptedPrompt {
            inputs: VecDeque::from(vec![
                Input::Message("   ".to_string()),
                Input::Message("  hello  ".to_string()),
            ]),
            ..Default::default()
        };
        let mut chat = Chat::new(session(vec!["Hi!"], Arc::default()), Box::new(prompt));

        chat.start().await?;

        let conversation = chat.session.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, "  hello  ");
        Ok(())
    }

    #[tokio::test]
    async fn test_attach_file_and_send_alone() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile()?;
        write!(file, "Filing status: single")?;

        let prompt = ScriptedPrompt {
            inputs: VecDeque::from(vec![
                Input::Attach {
                    source: AttachmentSource::Dialog,
                    paths: vec![file.path().to_path_buf()],
                },
                Input::Message(String::new()),
            ]),
            ..Default::default()
        };
        let pending = prompt.pending.clone();
        let mut chat = Chat::new(session(vec!["Noted."], Arc::default()), Box::new(prompt));

        chat.start().await?;

        assert_eq!(pending.lock().unwrap().len(), 1);
        assert!(pending.lock().unwrap()[0].contains("Filing status: single"));
        let conversation = chat.session.conversation();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].attachments.len(), 1);
        assert!(chat.session.pending_attachments().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_drop_is_reported() -> Result<()> {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        let notices = Arc::new(Notices::default());
        let prompt = ScriptedPrompt {
            inputs: VecDeque::from(vec![Input::Attach {
                source: AttachmentSource::Drop,
                paths: vec![file.path().to_path_buf()],
            }]),
            ..Default::default()
        };
        let mut chat = Chat::new(session(vec!["unused"], notices.clone()), Box::new(prompt));

        chat.start().await?;

        assert!(chat.session.pending_attachments().is_empty());
        assert_eq!(
            *notices.0.lock().unwrap(),
            vec!["Only image and text files are allowed!".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_headless_failure_notifies() -> Result<()> {
        let notices = Arc::new(Notices::default());
        let mut chat = Chat::new(
            session(Vec::new(), notices.clone()),
            Box::new(ScriptedPrompt::default()),
        );

        chat.headless_start("hello".to_string()).await?;

        assert_eq!(chat.session.conversation().len(), 1);
        assert_eq!(notices.0.lock().unwrap().len(), 1);
        Ok(())
    }
}
