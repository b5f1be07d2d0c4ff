//! IO-threads based module. Every worker gets its own OS thread.

pub mod mpsc;
pub mod oneshot;

pub use std::thread::{current, sleep, spawn, JoinHandle, ThreadId};

use crate::tracing::init_tracing;

pub fn run(f: fn()) {
    init_tracing();

    f()
}

/// Spawns a thread carrying `name`, so it shows up in panic messages and
/// debuggers.
pub fn spawn_named<F, T>(name: String, f: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new().name(name).spawn(f)
}
