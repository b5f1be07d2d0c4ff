use std::{env, str::FromStr, time::Duration};

pub const MAX_CHATS_ENV: &str = "WEBCHAT_MAX_CHATS";
pub const CREATE_TIMEOUT_ENV: &str = "WEBCHAT_CREATE_TIMEOUT_MS";

const DEFAULT_MAX_CHATS: usize = 16;
const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = crate::queued_user::DEFAULT_SHUTDOWN_TIMEOUT;

/// Sizing for a [`ChatManager`](crate::ChatManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatManagerConfig {
    /// Chats that may be open at the same time.
    pub max_chats: usize,
    /// Permit wait used by `create_chat_default`.
    pub create_timeout: Duration,
    /// How long `remove_user` and `close` wait for each delivery worker.
    pub shutdown_timeout: Duration,
}

impl Default for ChatManagerConfig {
    fn default() -> Self {
        Self {
            max_chats: DEFAULT_MAX_CHATS,
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ChatManagerConfig {
    pub fn new(max_chats: usize) -> Self {
        Self {
            max_chats,
            ..Self::default()
        }
    }

    pub fn max_chats(mut self, max_chats: usize) -> Self {
        self.max_chats = max_chats;
        self
    }

    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Reads `WEBCHAT_MAX_CHATS` and `WEBCHAT_CREATE_TIMEOUT_MS`, keeping the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_chats = parse_or(&lookup, MAX_CHATS_ENV, defaults.max_chats);
        let create_timeout = parse_or(
            &lookup,
            CREATE_TIMEOUT_ENV,
            defaults.create_timeout.as_millis() as u64,
        );
        Self {
            max_chats,
            create_timeout: Duration::from_millis(create_timeout),
            ..defaults
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, ?default, "ignoring invalid setting");
            default
        }
    }
}
