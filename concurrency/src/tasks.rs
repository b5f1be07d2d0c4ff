//! Async entry points for callers running on a tokio executor.

use std::time::Duration;

use webchat_rt::tasks::{self as rt, oneshot};

use crate::{chat::Chat, error::ChatManagerError, manager::ChatManager};

/// A create result the async caller has not picked up yet. If the caller
/// stopped waiting and this call opened the chat, dropping it closes the chat
/// again so its permit goes back to the pool.
struct UnclaimedChat {
    manager: ChatManager,
    chat: Option<Chat>,
    opened: bool,
}

impl UnclaimedChat {
    fn claim(mut self) -> Option<Chat> {
        self.chat.take()
    }
}

impl Drop for UnclaimedChat {
    fn drop(&mut self) {
        let Some(chat) = self.chat.take() else {
            return;
        };
        if !self.opened {
            return;
        }
        tracing::debug!(chat = %chat, "async caller went away, closing its chat");
        if let Err(e) = self.manager.close_chat(&chat) {
            tracing::warn!(chat = %chat, "could not close abandoned chat: {e}");
        }
    }
}

impl ChatManager {
    /// Async [`create_chat`](ChatManager::create_chat). The permit wait runs
    /// on the blocking pool so executor threads are never parked.
    ///
    /// Dropping the returned future (for instance through
    /// `tokio::time::timeout`) does not stop the wait, but a chat opened after
    /// the caller left is closed straight away. Chats that were already open
    /// under `name` are left alone.
    pub async fn create_chat_async(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<Chat, ChatManagerError> {
        let manager = self.clone();
        let name = name.to_string();
        let (tx, rx) = oneshot::channel();
        let _ = rt::spawn_blocking(move || {
            let result = manager
                .open_or_join(&name, timeout)
                .map(|(chat, opened)| UnclaimedChat {
                    manager: manager.clone(),
                    chat: Some(chat),
                    opened,
                });
            // Any chat the receiver never takes is closed by `UnclaimedChat`.
            let _ = tx.send(result);
        });

        match rx.await {
            Ok(result) => result?.claim().ok_or(ChatManagerError::Cancelled),
            Err(_) => {
                tracing::warn!("create_chat task ended without a result");
                Err(ChatManagerError::Cancelled)
            }
        }
    }
}
