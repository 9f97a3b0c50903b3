pub mod chat_controller;
pub mod events;
mod exchange;

#[cfg(test)]
mod chat_controller_test;

pub use chat_controller::{ChatController, ChatSnapshot, RenameMode};
pub use events::ChatEvent;
