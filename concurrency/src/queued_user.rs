//! Per-user asynchronous delivery.
//!
//! A [`QueuedUser`] wraps one [`User`] and turns each of its callbacks into a
//! unit of work on a private FIFO queue. One dedicated thread drains the queue,
//! invoking the wrapped user one event at a time, so:
//!
//! - events reach the wrapped user in exactly the order they were submitted,
//!   whichever thread submitted them;
//! - submitting never waits on the wrapped user, however slow it is;
//! - a panicking callback is caught and counted, and the worker moves on to
//!   the next event.
//!
//! Events for different users are independent; there is no ordering between
//! two `QueuedUser`s. The queue is unbounded and exposes its depth through
//! [`QueuedUser::pending`], but never pushes back on submitters.

use std::{
    any::Any,
    fmt::Debug,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use webchat_rt::threads::{self as rt, mpsc, oneshot, JoinHandle, ThreadId};

use crate::{
    chat::Chat,
    error::ChatManagerError,
    user::{User, UserRef},
};

enum Event {
    ChatCreated(Chat),
    ChatClosed(Chat),
    UserJoined(Chat, UserRef),
    UserLeft(Chat, UserRef),
    MessageReceived {
        chat: Chat,
        from: UserRef,
        message: String,
    },
    Flush(oneshot::Sender<()>),
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::ChatCreated(_) => "chat_created",
            Event::ChatClosed(_) => "chat_closed",
            Event::UserJoined(..) => "user_joined",
            Event::UserLeft(..) => "user_left",
            Event::MessageReceived { .. } => "message_received",
            Event::Flush(_) => "flush",
        }
    }

    fn deliver(self, user: &dyn User) {
        match self {
            Event::ChatCreated(chat) => user.chat_created(&chat),
            Event::ChatClosed(chat) => user.chat_closed(&chat),
            Event::UserJoined(chat, joined) => user.user_joined(&chat, &joined),
            Event::UserLeft(chat, left) => user.user_left(&chat, &left),
            Event::MessageReceived {
                chat,
                from,
                message,
            } => user.message_received(&chat, &from, &message),
            Event::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Set by the worker thread on its way out, however it exits.
struct CompletionGuard(Arc<(Mutex<bool>, Condvar)>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.0;
        let mut completed = lock.lock().unwrap_or_else(|p| p.into_inner());
        *completed = true;
        cvar.notify_all();
    }
}

/// Shared between the handle and its worker thread.
#[derive(Default)]
struct Counters {
    pending: AtomicUsize,
    delivered: AtomicU64,
    faults: AtomicU64,
}

pub struct QueuedUser {
    user: UserRef,
    sender: Mutex<Option<mpsc::Sender<Event>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: ThreadId,
    completion: Arc<(Mutex<bool>, Condvar)>,
    counters: Arc<Counters>,
}

impl Debug for QueuedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedUser")
            .field("name", &self.user.name())
            .field("pending", &self.pending())
            .field("faults", &self.faults())
            .finish_non_exhaustive()
    }
}

impl QueuedUser {
    /// Wraps `user` and starts its delivery worker.
    pub fn start(user: UserRef) -> Result<Self, ChatManagerError> {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();
        let counters = Arc::new(Counters::default());

        let completion = Arc::new((Mutex::new(false), Condvar::new()));

        let worker_user = user.clone();
        let worker_counters = counters.clone();
        let worker_completion = completion.clone();
        let worker = rt::spawn_named(format!("webchat-user-{}", user.name()), move || {
            let _guard = CompletionGuard(worker_completion);
            run_worker(worker_user, rx, worker_counters)
        })
        .map_err(|e| ChatManagerError::WorkerSpawn {
            name: user.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            user,
            sender: Mutex::new(Some(tx)),
            worker_thread: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
            completion,
            counters,
        })
    }

    /// Events submitted but not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    /// Callbacks that returned normally.
    pub fn delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Acquire)
    }

    /// Callbacks that panicked.
    pub fn faults(&self) -> u64 {
        self.counters.faults.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_none()
    }

    /// Blocks until every event submitted before this call has been handled,
    /// or `timeout` elapses. Returns `false` on timeout, if the queue is
    /// already shut down, or when called from inside one of the wrapped
    /// user's callbacks, since the running callback is ahead of the marker.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.on_worker_thread() {
            return false;
        }
        let (tx, rx) = oneshot::channel();
        if !self.enqueue(Event::Flush(tx)) {
            return false;
        }
        rx.recv_timeout(timeout).is_ok()
    }

    /// [`shutdown_timeout`](Self::shutdown_timeout) with
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub fn shutdown(&self) -> bool {
        self.shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Closes the queue and waits up to `timeout` for the worker to drain
    /// what was already submitted. Later submissions are dropped.
    ///
    /// Returns `true` once the worker has stopped. On `false` the worker is
    /// still inside a callback; it finishes the queue in the background and
    /// a later call can wait for it again. Called from inside one of the
    /// wrapped user's callbacks it closes the queue and returns `false`
    /// without waiting.
    pub fn shutdown_timeout(&self, timeout: Duration) -> bool {
        drop(self.sender.lock().unwrap_or_else(|p| p.into_inner()).take());
        if self.on_worker_thread() {
            return false;
        }

        let (lock, cvar) = &*self.completion;
        let completed = lock.lock().unwrap_or_else(|p| p.into_inner());
        let (completed, _) = cvar
            .wait_timeout_while(completed, timeout, |completed| !*completed)
            .unwrap_or_else(|p| p.into_inner());
        if !*completed {
            tracing::warn!(
                user = self.user.name(),
                ?timeout,
                pending = self.pending(),
                "delivery worker still busy after shutdown timeout"
            );
            return false;
        }
        drop(completed);

        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!(user = self.user.name(), "delivery worker terminated abnormally");
            }
        }
        true
    }

    fn on_worker_thread(&self) -> bool {
        rt::current().id() == self.worker_thread
    }

    fn enqueue(&self, event: Event) -> bool {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = sender.as_ref() else {
            tracing::warn!(
                user = self.user.name(),
                event = event.kind(),
                "dropping event for shut down user"
            );
            return false;
        };
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::SendError(event)) = tx.send(event) {
            self.counters.pending.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!(
                user = self.user.name(),
                event = event.kind(),
                "delivery worker gone, dropping event"
            );
            return false;
        }
        true
    }
}

impl User for QueuedUser {
    fn name(&self) -> &str {
        self.user.name()
    }

    fn color(&self) -> &str {
        self.user.color()
    }

    fn chat_created(&self, chat: &Chat) {
        self.enqueue(Event::ChatCreated(chat.clone()));
    }

    fn chat_closed(&self, chat: &Chat) {
        self.enqueue(Event::ChatClosed(chat.clone()));
    }

    fn user_joined(&self, chat: &Chat, user: &UserRef) {
        self.enqueue(Event::UserJoined(chat.clone(), user.clone()));
    }

    fn user_left(&self, chat: &Chat, user: &UserRef) {
        self.enqueue(Event::UserLeft(chat.clone(), user.clone()));
    }

    fn message_received(&self, chat: &Chat, from: &UserRef, message: &str) {
        self.enqueue(Event::MessageReceived {
            chat: chat.clone(),
            from: from.clone(),
            message: message.to_string(),
        });
    }
}

fn run_worker(user: UserRef, rx: mpsc::Receiver<Event>, counters: Arc<Counters>) {
    tracing::debug!(user = user.name(), "delivery worker started");

    // Ends once every sender is gone and the queue is empty.
    while let Ok(event) = rx.recv() {
        counters.pending.fetch_sub(1, Ordering::AcqRel);
        let kind = event.kind();
        let is_flush = matches!(event, Event::Flush(_));
        match catch_unwind(AssertUnwindSafe(|| event.deliver(&*user))) {
            Ok(()) if !is_flush => {
                counters.delivered.fetch_add(1, Ordering::AcqRel);
            }
            Ok(()) => {}
            Err(panic) => {
                counters.faults.fetch_add(1, Ordering::AcqRel);
                tracing::error!(
                    user = user.name(),
                    event = kind,
                    "panic in user handler: {}",
                    panic_message(&*panic)
                );
            }
        }
    }

    tracing::debug!(user = user.name(), "delivery worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
