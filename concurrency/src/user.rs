//! The capability set every chat participant provides.

use std::sync::Arc;

use crate::chat::Chat;

pub type UserRef = Arc<dyn User>;

/// A party that receives chat lifecycle and message events.
///
/// Callbacks default to no-ops so an implementation only overrides the events
/// it cares about. The registry never calls them directly: every registered
/// user sits behind a [`QueuedUser`](crate::QueuedUser), which runs them on a
/// dedicated worker thread in submission order.
pub trait User: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn color(&self) -> &str;

    fn chat_created(&self, _chat: &Chat) {}

    fn chat_closed(&self, _chat: &Chat) {}

    fn user_joined(&self, _chat: &Chat, _user: &UserRef) {}

    fn user_left(&self, _chat: &Chat, _user: &UserRef) {}

    fn message_received(&self, _chat: &Chat, _from: &UserRef, _message: &str) {}
}

impl std::fmt::Debug for dyn User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name())
            .field("color", &self.color())
            .finish()
    }
}
