//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod profile;
pub mod study_room;

#[cfg(test)]
mod tests;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::cli::chat::{run_ask, run_chat, ChatOptions};
use crate::cli::profile::{run_login, run_logout, run_signup, run_whoami};
use crate::cli::study_room::{run_images, run_notes, run_videos};
use crate::core::config::data::path_display;
use crate::core::config::{Config, ConfigError};
use crate::core::image::HttpImageUploader;
use crate::core::storage::FileStore;
use crate::utils::input::prompt_line;
use crate::utils::logging::init_tracing;

#[derive(Parser)]
#[command(name = "sensai")]
#[command(version)]
#[command(about = "A terminal learning assistant that answers questions about anything")]
#[command(
    long_about = "SensAI answers questions through an OpenAI-compatible chat-completion API, \
printing each answer with a typewriter effect. Follow-up questions keep the whole conversation \
as context, and an image can be attached to the first question.\n\n\
Study room:\n\
  Log in with 'sensai login' to save answers, videos and images, then browse them with \
'sensai notes', 'sensai videos' and 'sensai images'.\n\n\
Environment Variables:\n\
  SENSAI_API_KEY      API key sent as a bearer token (optional)\n\
  RUST_LOG            Log filter, e.g. sensai=debug\n\
  SENSAI_LOG_STDERR   Log to stderr when no --log file is given\n\n\
Chat commands:\n\
  /save             Save the last answer to your study room\n\
  /help             List chat commands\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to ask, overriding the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Base URL of the chat-completion API, overriding the configured one
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Read configuration from this file instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep the study room and profile in this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable logging to specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Image to attach: a local file (uploaded first) or an http(s) URL
        #[arg(short = 'i', long, value_name = "PATH_OR_URL")]
        image: Option<String>,
        /// Save the answer to your study room
        #[arg(short = 's', long)]
        save: bool,
        /// Print the answer at once instead of revealing it
        #[arg(long)]
        no_reveal: bool,
        /// The question
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        query: Vec<String>,
    },
    /// Start an interactive conversation (default)
    Chat {
        /// Image to attach to the first question
        #[arg(short = 'i', long, value_name = "PATH_OR_URL")]
        image: Option<String>,
        /// Print answers at once instead of revealing them
        #[arg(long)]
        no_reveal: bool,
        /// Optional first question
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Browse, search and delete saved answers
    Notes {
        #[command(subcommand)]
        action: Option<NotesAction>,
    },
    /// Browse, add and delete saved videos
    Videos {
        #[command(subcommand)]
        action: Option<VideosAction>,
    },
    /// Browse, upload and delete images
    Images {
        #[command(subcommand)]
        action: Option<ImagesAction>,
    },
    /// Log in to your study room
    Login {
        /// Email address (prompted when omitted)
        email: Option<String>,
    },
    /// Create a study room profile
    Signup {
        /// Display name (prompted when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Email address (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Log out of your study room
    Logout,
    /// Show who is logged in
    Whoami,
    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum NotesAction {
    /// List saved answers (default)
    List,
    /// Show saved answers whose question or answer contains a term
    Search {
        #[arg(trailing_var_arg = true, required = true)]
        term: Vec<String>,
    },
    /// Print one saved answer in full
    Show {
        /// Number shown by `sensai notes`
        number: usize,
    },
    /// Delete one saved answer
    Delete {
        /// Number shown by `sensai notes`
        number: usize,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum VideosAction {
    /// List saved videos (default)
    List,
    /// Save a video to your study room
    Add {
        /// Video id
        id: String,
        /// Video title
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
        #[arg(long, default_value = "")]
        thumbnail: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove a saved video by id
    Delete { id: String },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ImagesAction {
    /// List uploaded images (default)
    List,
    /// Upload a local image, or record an http(s) URL
    Upload {
        path: String,
        /// Name to show in listings (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete one image record
    Delete {
        /// Number shown by `sensai images`
        number: usize,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (default)
    Show,
    /// Set a configuration value
    Set {
        /// One of: base-url, model, api-key-env, upload-url, reveal-interval-ms,
        /// request-timeout-secs, data-dir
        key: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset { key: String },
}

/// Configuration plus the shared HTTP client handed to every command.
pub struct Settings {
    pub client: reqwest::Client,
    pub config: Config,
    pub config_path: PathBuf,
}

impl Settings {
    pub fn open_store(&self) -> Result<FileStore, ConfigError> {
        Ok(FileStore::new(self.config.resolve_data_dir()?))
    }
}

/// Apply command-line overrides on top of the file configuration. Never saved.
pub fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(model) = args.model.as_ref().filter(|m| !m.trim().is_empty()) {
        config.model = Some(model.clone());
    }
    if let Some(base_url) = args.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
        config.base_url = Some(base_url.clone());
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config
}

fn config_path(args: &Args) -> Result<PathBuf, ConfigError> {
    match &args.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_config_path(),
    }
}

fn run_config(path: PathBuf, action: Option<ConfigAction>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load_from_path(&path)?;
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => {
            config.print_all();
            println!("  (from {})", path_display(&path));
        }
        ConfigAction::Set { key, value } => {
            let value = value.join(" ");
            config.set(&key, &value)?;
            config.save_to_path(&path)?;
            println!("✅ Set {key} to: {value}");
        }
        ConfigAction::Unset { key } => {
            config.unset(&key)?;
            config.save_to_path(&path)?;
            println!("✅ Unset {key}");
        }
    }
    Ok(())
}

fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("sensai/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main());
    drop(runtime);

    if let Err(err) = result {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let mut args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let path = config_path(&args)?;
    debug!(config = %path_display(&path), "loading configuration");

    let command = args.command.take().unwrap_or(Commands::Chat {
        image: None,
        no_reveal: false,
        query: Vec::new(),
    });

    let settings = load_settings(path, &args)?;
    run_command(settings, command).await
}

async fn run_command(settings: Settings, command: Commands) -> Result<(), Box<dyn Error>> {
    let mut out = std::io::stdout();
    match command {
        Commands::Ask {
            image,
            save,
            no_reveal,
            query,
        } => {
            run_ask(
                &settings,
                query,
                ChatOptions {
                    image,
                    reveal: !no_reveal,
                    save,
                },
            )
            .await
        }
        Commands::Chat {
            image,
            no_reveal,
            query,
        } => {
            run_chat(
                &settings,
                query,
                ChatOptions {
                    image,
                    reveal: !no_reveal,
                    save: false,
                },
            )
            .await
        }
        Commands::Notes { action } => run_notes(
            &settings.open_store()?,
            action.unwrap_or(NotesAction::List),
            &mut out,
        ),
        Commands::Videos { action } => run_videos(
            &settings.open_store()?,
            action.unwrap_or(VideosAction::List),
            &mut out,
        ),
        Commands::Images { action } => {
            let uploader =
                HttpImageUploader::new(settings.client.clone(), settings.config.upload_url());
            run_images(
                &settings.open_store()?,
                &uploader,
                action.unwrap_or(ImagesAction::List),
                &mut out,
            )
            .await
        }
        Commands::Login { email } => run_login(&settings.open_store()?, email, prompt_line, &mut out),
        Commands::Signup { name, email } => {
            run_signup(&settings.open_store()?, name, email, prompt_line, &mut out)
        }
        Commands::Logout => run_logout(&settings.open_store()?, &mut out),
        Commands::Whoami => run_whoami(&settings.open_store()?, &mut out),
        // Edits the file as written, without command-line overrides.
        Commands::Config { action } => run_config(settings.config_path, action),
    }
}

fn load_settings(config_path: PathBuf, args: &Args) -> Result<Settings, Box<dyn Error>> {
    let config = apply_overrides(Config::load_from_path(&config_path)?, args);
    Ok(Settings {
        client: build_client()?,
        config,
        config_path,
    })
}
