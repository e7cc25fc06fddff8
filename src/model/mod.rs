//! Data model for conversation logs.
//!
//! A [`Conversation`] is the parsed, in-memory form of one log file: an
//! identifier, the time the conversation started, and its messages in
//! chronological order. [`Message`] values are immutable once built.

pub mod conversation;
pub mod message;

pub use conversation::Conversation;
pub use message::{Direction, Message};
