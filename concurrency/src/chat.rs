//! Chat identity.
//!
//! The registry only needs to know that a chat exists and whether a given
//! handle is the one currently registered under its name. Membership and
//! message routing live with whoever owns the chat.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing, never reused.
static NEXT_CHAT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(u64);

impl ChatId {
    fn next() -> Self {
        Self(NEXT_CHAT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({})", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a named chat.
///
/// Cloning is cheap. Two handles compare equal only if they come from the
/// same creation: a chat re-created under a previously used name is a
/// different chat.
#[derive(Clone)]
pub struct Chat {
    id: ChatId,
    name: Arc<str>,
}

impl Chat {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: ChatId::next(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> ChatId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Chat {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Chat {}

impl Hash for Chat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chat")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id)
    }
}
