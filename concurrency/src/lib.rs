//! # webchat-concurrency
//!
//! Concurrency core of a multi-user chat session manager.
//!
//! - **[`ChatManager`]** - a bounded registry of named chats and registered
//!   users. Chat creation is admission controlled: at most `max_chats` chats
//!   are open at once, and creating one more waits for a close, up to a
//!   timeout.
//! - **[`QueuedUser`]** - per-user asynchronous delivery. Every registered
//!   [`User`] gets a private FIFO queue and a dedicated worker thread, so
//!   lifecycle fan-out never runs user code on the caller's thread and a slow
//!   or panicking user cannot hold anyone else up.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::{sync::Arc, time::Duration};
//! use webchat_concurrency::{Chat, ChatManager, User};
//!
//! struct Printer;
//!
//! impl User for Printer {
//!     fn name(&self) -> &str { "printer" }
//!     fn color(&self) -> &str { "007AFF" }
//!     fn chat_created(&self, chat: &Chat) { println!("new chat {}", chat.name()); }
//! }
//!
//! let manager = ChatManager::new(10);
//! manager.register_user(Arc::new(Printer))?;
//! let chat = manager.create_chat("general", Duration::from_secs(5))?;
//! manager.close_chat(&chat)?;
//! ```
//!
//! ## Chat names
//!
//! `create_chat` is join-by-name: if a chat is already registered under the
//! name, every caller gets that same chat and no permit is taken. Only the
//! caller that claims a new name waits for capacity. If that wait times out
//! the claim is withdrawn, so a failed create never leaves a name or a permit
//! behind.

pub mod chat;
pub mod config;
pub mod error;
mod manager;
mod permits;
mod queued_user;
mod tasks;
pub mod user;

#[cfg(test)]
mod queued_user_tests;
#[cfg(test)]
mod test_support;

pub use chat::{Chat, ChatId};
pub use config::ChatManagerConfig;
pub use error::ChatManagerError;
pub use manager::ChatManager;
pub use permits::AdmissionPermits;
pub use queued_user::{QueuedUser, DEFAULT_SHUTDOWN_TIMEOUT};
pub use user::{User, UserRef};
