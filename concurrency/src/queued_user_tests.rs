//! Tests for per-user queued delivery.

use crate::chat::Chat;
use crate::queued_user::QueuedUser;
use crate::test_support::RecordingUser;
use crate::user::{User, UserRef};
use std::{
    sync::{mpsc, Arc, Mutex, Weak},
    thread,
    time::{Duration, Instant},
};

fn sender() -> UserRef {
    RecordingUser::new("sender").0.into_ref()
}

#[test]
fn delivers_in_submission_order_despite_slow_handler() {
    let (user, log) = RecordingUser::new("receiver");
    let queued = QueuedUser::start(user.with_delay(Duration::from_millis(10)).into_ref()).unwrap();
    let chat = Chat::new("order");
    let from = sender();

    for i in 1..=20 {
        queued.message_received(&chat, &from, &i.to_string());
    }

    assert!(queued.flush(Duration::from_secs(5)));
    let expected: Vec<String> = (1..=20).map(|i| format!("message:order:sender:{i}")).collect();
    assert_eq!(log.snapshot(), expected);
    assert_eq!(queued.delivered(), 20);
    assert_eq!(queued.pending(), 0);
}

#[test]
fn submitting_never_waits_for_the_handler() {
    let (user, log) = RecordingUser::new("slow");
    let queued = QueuedUser::start(user.with_delay(Duration::from_millis(200)).into_ref()).unwrap();
    let chat = Chat::new("fast_submit");

    let start = Instant::now();
    for _ in 0..5 {
        queued.chat_created(&chat);
    }
    assert!(start.elapsed() < Duration::from_millis(100));
    assert!(queued.pending() >= 4);

    assert!(log.wait_for(5, Duration::from_secs(5)));
}

#[test]
fn keeps_each_submitter_order_under_concurrent_submission() {
    let (user, log) = RecordingUser::new("shared");
    let queued = Arc::new(QueuedUser::start(user.into_ref()).unwrap());
    let chat = Chat::new("many");

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let queued = queued.clone();
            let chat = chat.clone();
            thread::spawn(move || {
                let from = sender();
                for j in 0..25 {
                    queued.message_received(&chat, &from, &format!("{t}-{j}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(queued.flush(Duration::from_secs(5)));
    let events = log.snapshot();
    assert_eq!(events.len(), 100);
    for t in 0..4 {
        let prefix = format!("message:many:sender:{t}-");
        let seen: Vec<usize> = events
            .iter()
            .filter_map(|e| e.strip_prefix(&prefix))
            .map(|j| j.parse().unwrap())
            .collect();
        assert_eq!(seen, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn panicking_handler_does_not_stop_the_worker() {
    let (user, log) = RecordingUser::new("fragile");
    let queued = QueuedUser::start(user.panicking_on("boom").into_ref()).unwrap();
    let chat = Chat::new("faults");
    let from = sender();

    queued.message_received(&chat, &from, "1");
    queued.message_received(&chat, &from, "boom");
    queued.message_received(&chat, &from, "2");

    assert!(queued.flush(Duration::from_secs(5)));
    assert_eq!(
        log.snapshot(),
        vec![
            "message:faults:sender:1".to_string(),
            "message:faults:sender:2".to_string(),
        ]
    );
    assert_eq!(queued.faults(), 1);
    assert_eq!(queued.delivered(), 2);
}

#[test]
fn slow_users_are_served_in_parallel() {
    let delay = Duration::from_millis(300);
    let users: Vec<_> = (0..5)
        .map(|i| {
            let (user, log) = RecordingUser::new(&format!("parallel_{i}"));
            let queued = QueuedUser::start(user.with_delay(delay).into_ref()).unwrap();
            (queued, log)
        })
        .collect();
    let chat = Chat::new("parallel");

    let start = Instant::now();
    for (queued, _) in &users {
        queued.chat_created(&chat);
    }
    for (_, log) in &users {
        assert!(log.wait_for(1, Duration::from_secs(5)));
    }
    let elapsed = start.elapsed();

    assert!(elapsed >= delay);
    assert!(elapsed < delay * 3, "delivery looks sequential: {elapsed:?}");
}

#[test]
fn shutdown_drains_then_drops_later_events() {
    let (user, log) = RecordingUser::new("leaving");
    let queued = QueuedUser::start(user.with_delay(Duration::from_millis(20)).into_ref()).unwrap();
    let chat = Chat::new("drain");

    for _ in 0..5 {
        queued.chat_created(&chat);
    }
    queued.shutdown();
    assert_eq!(log.len(), 5);
    assert!(queued.is_shut_down());

    queued.chat_closed(&chat);
    assert!(!queued.flush(Duration::from_millis(50)));
    assert_eq!(log.len(), 5);

    // Idempotent.
    queued.shutdown();
}

#[test]
fn routes_every_callback_to_the_wrapped_user() {
    let (user, log) = RecordingUser::new("all");
    let queued = QueuedUser::start(user.into_ref()).unwrap();
    let chat = Chat::new("room");
    let other = sender();

    queued.chat_created(&chat);
    queued.user_joined(&chat, &other);
    queued.message_received(&chat, &other, "hi");
    queued.user_left(&chat, &other);
    queued.chat_closed(&chat);

    assert!(queued.flush(Duration::from_secs(5)));
    assert_eq!(
        log.snapshot(),
        vec![
            "created:room",
            "joined:room:sender",
            "message:room:sender:hi",
            "left:room:sender",
            "closed:room",
        ]
    );
    assert_eq!(queued.name(), "all");
    assert_eq!(queued.color(), "007AFF");
}

#[test]
fn shutdown_gives_up_on_a_stuck_handler() {
    let (user, log) = RecordingUser::new("stuck");
    let queued = QueuedUser::start(user.with_delay(Duration::from_secs(2)).into_ref()).unwrap();
    let chat = Chat::new("stuck");

    queued.chat_created(&chat);
    thread::sleep(Duration::from_millis(50));

    let start = Instant::now();
    assert!(!queued.shutdown_timeout(Duration::from_millis(100)));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(queued.is_shut_down());

    // The worker still finishes in the background and a later call sees it.
    assert!(queued.shutdown_timeout(Duration::from_secs(5)));
    assert_eq!(log.snapshot(), vec!["created:stuck"]);
}

/// Calls back into its own wrapper from inside a callback.
struct SelfFlushing {
    wrapper: Arc<Mutex<Weak<QueuedUser>>>,
    results: Mutex<mpsc::Sender<(bool, Duration)>>,
}

impl User for SelfFlushing {
    fn name(&self) -> &str {
        "self_flushing"
    }

    fn color(&self) -> &str {
        "34C759"
    }

    fn chat_created(&self, _chat: &Chat) {
        let Some(wrapper) = self.wrapper.lock().unwrap().upgrade() else {
            return;
        };
        let start = Instant::now();
        let flushed = wrapper.flush(Duration::from_secs(2));
        let _ = self.results.lock().unwrap().send((flushed, start.elapsed()));
    }
}

#[test]
fn flush_from_own_callback_returns_at_once() {
    let slot = Arc::new(Mutex::new(Weak::new()));
    let (tx, rx) = mpsc::channel();
    let user = SelfFlushing {
        wrapper: slot.clone(),
        results: Mutex::new(tx),
    };
    let queued = Arc::new(QueuedUser::start(Arc::new(user)).unwrap());
    *slot.lock().unwrap() = Arc::downgrade(&queued);

    queued.chat_created(&Chat::new("reentrant"));

    let (flushed, elapsed) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(!flushed);
    assert!(elapsed < Duration::from_millis(500));
    assert!(queued.flush(Duration::from_secs(5)));
}
