//! Conversation synchronization core for the palaver chat client.
//!
//! Keeps a local conversation directory and the active session consistent
//! with a remote conversation store, and presents assistant replies and
//! conversation titles through a cancellable character-by-character reveal.

pub mod auth;
pub mod controllers;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod settings;

pub use controllers::{ChatController, ChatEvent, ChatSnapshot, RenameMode};
pub use error::{ChatError, ChatResult, RemoteError, RemoteResult};
