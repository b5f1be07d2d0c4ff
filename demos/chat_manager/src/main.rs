//! Walks the chat manager through its lifecycle: users register, chats open
//! until capacity runs out, a waiting create is unblocked by a close, and a
//! user whose handler panics keeps receiving events.
//!
//! `WEBCHAT_MAX_CHATS` and `WEBCHAT_CREATE_TIMEOUT_MS` size the manager;
//! `RUST_LOG=debug` shows directory and fan-out activity.

use std::sync::Arc;
use std::time::Duration;

use webchat_concurrency::{Chat, ChatManager, ChatManagerConfig, ChatManagerError, User, UserRef};
use webchat_rt::threads as rt;

struct Member {
    name: String,
    color: String,
    delay: Duration,
}

impl Member {
    fn new(name: &str, color: &str, delay: Duration) -> UserRef {
        Arc::new(Self {
            name: name.to_string(),
            color: color.to_string(),
            delay,
        })
    }
}

impl User for Member {
    fn name(&self) -> &str {
        &self.name
    }

    fn color(&self) -> &str {
        &self.color
    }

    fn chat_created(&self, chat: &Chat) {
        rt::sleep(self.delay);
        tracing::info!("[{}] chat {} opened", self.name, chat.name());
    }

    fn chat_closed(&self, chat: &Chat) {
        tracing::info!("[{}] chat {} closed", self.name, chat.name());
    }

    fn message_received(&self, chat: &Chat, from: &UserRef, message: &str) {
        if message.is_empty() {
            panic!("{} cannot handle empty messages", self.name);
        }
        tracing::info!("[{}] {}@{}: {}", self.name, from.name(), chat.name(), message);
    }
}

fn main() {
    rt::run(|| {
        let config = ChatManagerConfig::from_env();
        tracing::info!(?config, "starting chat manager");
        let manager = ChatManager::with_config(config);

        let users = [
            Member::new("Alice", "007AFF", Duration::ZERO),
            Member::new("Bob", "FF9500", Duration::from_millis(200)),
        ];
        for user in users {
            if let Err(e) = manager.register_user(user) {
                tracing::error!("{e}");
            }
        }
        if let Err(e) = manager.register_user(Member::new("Alice", "34C759", Duration::ZERO)) {
            tracing::warn!("{e}");
        }

        // Fill every slot; the next create has to wait.
        let mut open: Vec<Chat> = Vec::new();
        for i in 0.. {
            match manager.create_chat(&format!("room-{i}"), Duration::from_millis(100)) {
                Ok(chat) => open.push(chat),
                Err(ChatManagerError::CapacityTimeout { name, .. }) => {
                    tracing::info!("{name} rejected, {} chats open", manager.open_chats());
                    break;
                }
                Err(e) => {
                    tracing::error!("{e}");
                    return;
                }
            }
        }

        if let Some(first) = open.first().cloned() {
            let waiter = {
                let manager = manager.clone();
                rt::spawn(move || manager.create_chat_default("late-room"))
            };
            rt::sleep(Duration::from_millis(50));
            if let Err(e) = manager.close_chat(&first) {
                tracing::error!("{e}");
            }
            match waiter.join() {
                Ok(Ok(chat)) => tracing::info!("{} opened after a close", chat.name()),
                Ok(Err(e)) => tracing::warn!("{e}"),
                Err(_) => tracing::error!("waiter panicked"),
            }
            if let Err(e) = manager.close_chat(&first) {
                tracing::info!("second close rejected: {e}");
            }
        }

        if let (Some(chat), Some(alice), Some(bob)) = (
            manager.chat("late-room"),
            manager.user("Alice"),
            manager.user("Bob"),
        ) {
            bob.message_received(&chat, &alice, "");
            bob.message_received(&chat, &alice, "still listening?");
        }

        for user in manager.users() {
            if let Some(queued) = manager.queued_user(user.name()) {
                queued.flush(Duration::from_secs(5));
                tracing::info!(
                    user = user.name(),
                    delivered = queued.delivered(),
                    faults = queued.faults(),
                    "delivery stats"
                );
            }
        }

        manager.close();
        tracing::info!("Chat manager demo complete");
    });
}
