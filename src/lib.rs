//! SensAI is a terminal learning assistant backed by an OpenAI-compatible
//! chat-completion API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation accumulator, the typewriter revealer,
//!   image attachments, configuration, and the study room with its local
//!   profile on top of pluggable key-value storage.
//! - [`api`] defines the chat-completion payloads sent over the wire.
//! - [`cli`] parses arguments and runs the `ask`, `chat` and study room
//!   commands.
//! - [`utils`] holds logging setup, line input and URL helpers.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
