//! Chat and user directory with admission control on chat creation.

use std::{
    collections::{hash_map::Entry, HashMap},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use crate::{
    chat::Chat,
    config::ChatManagerConfig,
    error::ChatManagerError,
    permits::AdmissionPermits,
    queued_user::QueuedUser,
    user::{User, UserRef},
};

/// Directory slot for a chat name. `admitted` flips once the creator holds a
/// permit; until then the chat is only visible to callers racing on the name.
#[derive(Debug)]
struct ChatEntry {
    chat: Chat,
    admitted: bool,
}

#[derive(Debug)]
struct Inner {
    config: ChatManagerConfig,
    chats: RwLock<HashMap<String, ChatEntry>>,
    users: RwLock<HashMap<String, Arc<QueuedUser>>>,
    permits: AdmissionPermits,
    closed: AtomicBool,
}

/// Bounded registry of named chats and registered users.
///
/// At most `max_chats` chats are open at once. Creating a chat beyond that
/// waits for one to close, up to a caller supplied timeout. Chat lifecycle
/// events are fanned out to every registered user through its
/// [`QueuedUser`], so the calling thread never runs user code.
///
/// Cloning is cheap and every clone manages the same directories.
#[derive(Debug, Clone)]
pub struct ChatManager {
    inner: Arc<Inner>,
}

impl ChatManager {
    pub fn new(max_chats: usize) -> Self {
        Self::with_config(ChatManagerConfig::new(max_chats))
    }

    pub fn with_config(config: ChatManagerConfig) -> Self {
        let permits = AdmissionPermits::new(config.max_chats);
        Self {
            inner: Arc::new(Inner {
                config,
                chats: RwLock::new(HashMap::new()),
                users: RwLock::new(HashMap::new()),
                permits,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ChatManagerConfig {
        &self.inner.config
    }

    /// Registers `user` behind its own delivery queue.
    pub fn register_user(&self, user: UserRef) -> Result<(), ChatManagerError> {
        let name = user.name().to_string();
        if self.is_closed() {
            return Err(ChatManagerError::Closed);
        }
        if self.read_users().contains_key(&name) {
            return Err(ChatManagerError::DuplicateUser { name });
        }

        // Start the worker outside the lock; losing a registration race
        // shuts it down again before anything else can see it.
        let queued = Arc::new(QueuedUser::start(user)?);
        let rejected = {
            let mut users = self.write_users();
            if self.is_closed() {
                Some(ChatManagerError::Closed)
            } else {
                match users.entry(name.clone()) {
                    Entry::Occupied(_) => Some(ChatManagerError::DuplicateUser {
                        name: name.clone(),
                    }),
                    Entry::Vacant(slot) => {
                        slot.insert(queued.clone());
                        None
                    }
                }
            }
        };
        if let Some(error) = rejected {
            queued.shutdown();
            return Err(error);
        }

        tracing::info!(user = %name, color = queued.color(), "user registered");
        Ok(())
    }

    /// Removes a user and stops its delivery worker once its queue drains.
    ///
    /// Waits at most the configured `shutdown_timeout` for the worker; a
    /// handler that never returns leaves the worker running in the
    /// background instead of blocking the caller.
    pub fn remove_user(&self, name: &str) -> Option<UserRef> {
        let queued = self.write_users().remove(name)?;
        queued.shutdown_timeout(self.inner.config.shutdown_timeout);
        tracing::info!(user = name, "user removed");
        Some(queued as UserRef)
    }

    /// Returns the chat registered under `name`, creating it if needed.
    ///
    /// Only the caller that claims a new name waits for an admission permit,
    /// for at most `timeout`. Everyone else asking for the same name gets the
    /// claimed chat straight away, without touching the permit pool. If the
    /// wait times out the claim is withdrawn and the name is free again.
    pub fn create_chat(&self, name: &str, timeout: Duration) -> Result<Chat, ChatManagerError> {
        self.open_or_join(name, timeout).map(|(chat, _)| chat)
    }

    /// [`create_chat`](Self::create_chat), also reporting whether this call
    /// opened the chat (`true`) or joined one already claimed (`false`).
    pub(crate) fn open_or_join(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<(Chat, bool), ChatManagerError> {
        if self.is_closed() {
            return Err(ChatManagerError::Closed);
        }

        let chat = match self.write_chats().entry(name.to_string()) {
            Entry::Occupied(existing) => {
                tracing::debug!(chat = name, "joining existing chat");
                return Ok((existing.get().chat.clone(), false));
            }
            Entry::Vacant(slot) => {
                let chat = Chat::new(name);
                slot.insert(ChatEntry {
                    chat: chat.clone(),
                    admitted: false,
                });
                chat
            }
        };

        if !self.inner.permits.try_acquire_for(timeout) {
            self.withdraw_claim(&chat);
            tracing::warn!(chat = name, ?timeout, "no capacity for new chat");
            return Err(ChatManagerError::CapacityTimeout {
                name: name.to_string(),
                timeout,
            });
        }

        let admitted = match self.write_chats().get_mut(name) {
            Some(entry) if entry.chat == chat => {
                entry.admitted = true;
                true
            }
            _ => false,
        };
        if !admitted {
            self.inner.permits.release();
            return Err(ChatManagerError::UnknownChat {
                name: name.to_string(),
            });
        }

        tracing::info!(chat = %chat, "chat opened");
        self.fan_out(|user| user.chat_created(&chat));
        Ok((chat, true))
    }

    /// [`create_chat`](Self::create_chat) with the configured timeout.
    pub fn create_chat_default(&self, name: &str) -> Result<Chat, ChatManagerError> {
        self.create_chat(name, self.inner.config.create_timeout)
    }

    /// Closes `chat`, which must be the instance currently open under its
    /// name. A stale or still pending handle is rejected without changes.
    pub fn close_chat(&self, chat: &Chat) -> Result<(), ChatManagerError> {
        {
            let mut chats = self.write_chats();
            let current = chats
                .get(chat.name())
                .is_some_and(|entry| entry.admitted && entry.chat == *chat);
            if !current {
                return Err(ChatManagerError::UnknownChat {
                    name: chat.name().to_string(),
                });
            }
            chats.remove(chat.name());
        }
        self.inner.permits.release();

        tracing::info!(chat = %chat, "chat closed");
        self.fan_out(|user| user.chat_closed(chat));
        Ok(())
    }

    pub fn chat(&self, name: &str) -> Option<Chat> {
        self.read_chats()
            .get(name)
            .filter(|entry| entry.admitted)
            .map(|entry| entry.chat.clone())
    }

    /// Snapshot of the open chats.
    pub fn chats(&self) -> Vec<Chat> {
        self.read_chats()
            .values()
            .filter(|entry| entry.admitted)
            .map(|entry| entry.chat.clone())
            .collect()
    }

    pub fn open_chats(&self) -> usize {
        self.read_chats()
            .values()
            .filter(|entry| entry.admitted)
            .count()
    }

    pub fn user(&self, name: &str) -> Option<UserRef> {
        self.queued_user(name).map(|queued| queued as UserRef)
    }

    /// The delivery wrapper registered under `name`, for flushing or
    /// inspecting its counters.
    pub fn queued_user(&self, name: &str) -> Option<Arc<QueuedUser>> {
        self.read_users().get(name).cloned()
    }

    /// Snapshot of the registered users.
    pub fn users(&self) -> Vec<UserRef> {
        self.read_users()
            .values()
            .map(|queued| queued.clone() as UserRef)
            .collect()
    }

    pub fn max_chats(&self) -> usize {
        self.inner.permits.capacity()
    }

    pub fn available_permits(&self) -> usize {
        self.inner.permits.available()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stops accepting users and chats, then shuts down every delivery
    /// worker after it drains. Open chats can still be closed.
    ///
    /// Each worker is waited on for at most the configured
    /// `shutdown_timeout`.
    pub fn close(&self) {
        let drained: Vec<Arc<QueuedUser>> = {
            let mut users = self.write_users();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            users.drain().map(|(_, queued)| queued).collect()
        };
        let shutdown_timeout = self.inner.config.shutdown_timeout;
        for queued in &drained {
            queued.shutdown_timeout(shutdown_timeout);
        }
        tracing::info!(users = drained.len(), "chat manager closed");
    }

    fn withdraw_claim(&self, chat: &Chat) {
        let mut chats = self.write_chats();
        if chats
            .get(chat.name())
            .is_some_and(|entry| entry.chat == *chat)
        {
            chats.remove(chat.name());
            tracing::debug!(chat = %chat, "withdrew chat claim");
        }
    }

    /// Hands an event to every user registered right now. Enqueueing never
    /// blocks, and users registered mid fan-out may or may not be included.
    fn fan_out(&self, event: impl Fn(&QueuedUser)) {
        let users: Vec<Arc<QueuedUser>> = self.read_users().values().cloned().collect();
        tracing::debug!(users = users.len(), "fanning out event");
        for user in users.iter().map(Arc::as_ref) {
            event(user);
        }
    }

    fn read_chats(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ChatEntry>> {
        self.inner.chats.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_chats(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ChatEntry>> {
        self.inner.chats.write().unwrap_or_else(|p| p.into_inner())
    }

    fn read_users(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<QueuedUser>>> {
        self.inner.users.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_users(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<QueuedUser>>> {
        self.inner.users.write().unwrap_or_else(|p| p.into_inner())
    }
}
