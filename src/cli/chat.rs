//! `sensai ask` and `sensai chat`: questions answered with a typewriter reveal.

use std::error::Error;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::cli::Settings;
use crate::core::completion::{CompletionClient, CompletionParams, HttpCompletionClient};
use crate::core::conversation::{ConversationAccumulator, SubmitError};
use crate::core::image::{is_remote_url, upload_file, HttpImageUploader};
use crate::core::profile::{Profile, User};
use crate::core::reveal::{RevealEvent, Revealer};
use crate::core::storage::KeyValueStore;
use crate::core::study_room::StudyRoom;
use crate::utils::input::sanitize_text_input;

pub struct ChatOptions {
    pub image: Option<String>,
    pub reveal: bool,
    pub save: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// Print `text` one character per reveal tick, returning once the reveal is done.
pub async fn print_revealed<W: Write>(
    revealer: &mut Revealer,
    text: String,
    out: &mut W,
) -> io::Result<()> {
    revealer.reveal(text);
    while let Some(event) = revealer.next_event().await {
        match event {
            RevealEvent::Progress { ch, .. } => {
                write!(out, "{ch}")?;
                out.flush()?;
            }
            RevealEvent::Done { .. } => break,
        }
    }
    writeln!(out)?;
    out.flush()
}

/// One interactive conversation: the accumulator, the revealer, and where notes go.
pub struct ChatSession<'a, W: Write> {
    accumulator: ConversationAccumulator,
    revealer: Revealer,
    reveal: bool,
    store: &'a dyn KeyValueStore,
    user: Option<User>,
    pending_image: Option<String>,
    out: W,
}

impl<'a, W: Write> ChatSession<'a, W> {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        revealer: Revealer,
        reveal: bool,
        store: &'a dyn KeyValueStore,
        user: Option<User>,
        out: W,
    ) -> Self {
        Self {
            accumulator: ConversationAccumulator::new(client),
            revealer,
            reveal,
            store,
            user,
            pending_image: None,
            out,
        }
    }

    /// Attach `image_url` to the first question of the session.
    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.pending_image = image_url;
        self
    }

    pub fn accumulator(&self) -> &ConversationAccumulator {
        &self.accumulator
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Ask one question and show the answer. Returns whether an answer arrived.
    pub async fn ask(&mut self, query: &str) -> io::Result<bool> {
        let result = self
            .accumulator
            .submit(query, self.pending_image.as_deref())
            .await;
        if self.accumulator.turn_count() > 0 {
            self.pending_image = None;
        }

        match result {
            Ok(answer) => {
                if self.reveal {
                    print_revealed(&mut self.revealer, answer, &mut self.out).await?;
                } else {
                    writeln!(self.out, "{answer}")?;
                }
                Ok(true)
            }
            Err(SubmitError::Validation) => Ok(false),
            Err(err) => {
                writeln!(self.out, "❌ {err}")?;
                Ok(false)
            }
        }
    }

    pub fn save_last(&mut self) -> io::Result<()> {
        let Some(user) = &self.user else {
            writeln!(self.out, "Log in to save answers to your study room.")?;
            return Ok(());
        };
        let Some(exchange) = self.accumulator.last_exchange() else {
            writeln!(self.out, "Nothing to save yet.")?;
            return Ok(());
        };

        match StudyRoom::new(self.store).save_note(&user.id, &exchange) {
            Ok(_) => writeln!(self.out, "✓ Saved to your study room."),
            Err(err) => writeln!(self.out, "❌ {err}"),
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> io::Result<LoopControl> {
        let line = sanitize_text_input(line);
        match line.trim() {
            "/quit" | "/exit" => return Ok(LoopControl::Quit),
            "/save" => self.save_last()?,
            "/help" => {
                writeln!(self.out, "Type a follow-up question and press Enter.")?;
                writeln!(self.out, "  /save   Save the last answer to your study room")?;
                writeln!(self.out, "  /quit   Leave the chat")?;
            }
            query => {
                self.ask(query).await?;
            }
        }
        Ok(LoopControl::Continue)
    }
}

/// Turn `--image` into a hosted URL, uploading local files first.
async fn resolve_image(
    settings: &Settings,
    reference: Option<&str>,
) -> Result<Option<String>, Box<dyn Error>> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    if is_remote_url(reference) {
        return Ok(Some(reference.to_string()));
    }

    let uploader = HttpImageUploader::new(settings.client.clone(), settings.config.upload_url());
    let url = upload_file(&uploader, Path::new(reference)).await?;
    info!(%url, "uploaded image attachment");
    Ok(Some(url))
}

fn completion_client(settings: &Settings) -> Arc<dyn CompletionClient> {
    Arc::new(HttpCompletionClient::new(
        settings.client.clone(),
        CompletionParams {
            base_url: settings.config.base_url().to_string(),
            model: settings.config.model().to_string(),
            api_key: settings.config.api_key(),
            timeout: settings.config.request_timeout(),
        },
    ))
}

pub async fn run_ask(
    settings: &Settings,
    query: Vec<String>,
    options: ChatOptions,
) -> Result<(), Box<dyn Error>> {
    let query = query.join(" ");
    if query.trim().is_empty() {
        return Err("Usage: sensai ask <question>".into());
    }

    let store = settings.open_store()?;
    let user = Profile::new(&store).current_user()?;
    if options.save && user.is_none() {
        return Err("Log in with `sensai login` to save answers.".into());
    }

    let image_url = resolve_image(settings, options.image.as_deref()).await?;
    let mut session = ChatSession::new(
        completion_client(settings),
        Revealer::new(settings.config.reveal_interval()),
        options.reveal && !settings.config.reveal_interval().is_zero(),
        &store,
        user,
        io::stdout(),
    )
    .with_image(image_url);

    if !session.ask(&query).await? {
        return Err("No answer received.".into());
    }
    if options.save {
        session.save_last()?;
    }
    Ok(())
}

pub async fn run_chat(
    settings: &Settings,
    initial: Vec<String>,
    options: ChatOptions,
) -> Result<(), Box<dyn Error>> {
    let store = settings.open_store()?;
    let user = Profile::new(&store).current_user()?;
    let image_url = resolve_image(settings, options.image.as_deref()).await?;

    let has_image = image_url.is_some();
    let mut session = ChatSession::new(
        completion_client(settings),
        Revealer::new(settings.config.reveal_interval()),
        options.reveal && !settings.config.reveal_interval().is_zero(),
        &store,
        user,
        io::stdout(),
    )
    .with_image(image_url);

    println!("SensAI ({}). Type /help for commands.", settings.config.model());

    let initial = initial.join(" ");
    if !initial.trim().is_empty() {
        println!("> {initial}");
        session.ask(&initial).await?;
    } else if has_image {
        println!("The image will be attached to your first question.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if session.handle_line(&line).await? == LoopControl::Quit {
            break;
        }
    }

    Ok(())
}
