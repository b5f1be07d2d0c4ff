//! Test doubles shared by the unit tests.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use crate::{
    chat::Chat,
    user::{User, UserRef},
};

/// Append-only record of the callbacks a test user received.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Polls until at least `count` events were recorded.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.len() >= count
    }
}

pub struct RecordingUser {
    name: String,
    color: String,
    delay: Duration,
    panic_on: Option<String>,
    log: EventLog,
}

impl RecordingUser {
    pub fn new(name: &str) -> (Self, EventLog) {
        let log = EventLog::default();
        let user = Self {
            name: name.to_string(),
            color: "007AFF".to_string(),
            delay: Duration::ZERO,
            panic_on: None,
            log: log.clone(),
        };
        (user, log)
    }

    /// Sleeps this long inside every callback.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panics when receiving exactly this message, before recording it.
    pub fn panicking_on(mut self, message: &str) -> Self {
        self.panic_on = Some(message.to_string());
        self
    }

    pub fn into_ref(self) -> UserRef {
        Arc::new(self)
    }

    fn record(&self, event: String) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.log.push(event);
    }
}

impl User for RecordingUser {
    fn name(&self) -> &str {
        &self.name
    }

    fn color(&self) -> &str {
        &self.color
    }

    fn chat_created(&self, chat: &Chat) {
        self.record(format!("created:{}", chat.name()));
    }

    fn chat_closed(&self, chat: &Chat) {
        self.record(format!("closed:{}", chat.name()));
    }

    fn user_joined(&self, chat: &Chat, user: &UserRef) {
        self.record(format!("joined:{}:{}", chat.name(), user.name()));
    }

    fn user_left(&self, chat: &Chat, user: &UserRef) {
        self.record(format!("left:{}:{}", chat.name(), user.name()));
    }

    fn message_received(&self, chat: &Chat, from: &UserRef, message: &str) {
        if self.panic_on.as_deref() == Some(message) {
            panic!("handler rejected message {message}");
        }
        self.record(format!("message:{}:{}:{}", chat.name(), from.name(), message));
    }
}

/// Overrides a single callback and keeps the no-op defaults for the rest.
pub struct CreatedCounter {
    pub name: String,
    pub created: Arc<Mutex<Vec<Chat>>>,
}

impl User for CreatedCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn color(&self) -> &str {
        "FF9500"
    }

    fn chat_created(&self, chat: &Chat) {
        self.created.lock().unwrap().push(chat.clone());
    }
}
