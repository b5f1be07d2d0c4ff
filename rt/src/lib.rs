//! Runtime wrapper to remove dependencies from code. The concurrency crate
//! only talks to threads, channels and the blocking pool through this crate,
//! so swapping the underlying implementation stays a local change.
//!
//! - `threads`: dedicated OS threads plus std/crossbeam channels.
//! - `tasks`: tokio's blocking pool and oneshot, to bridge blocking calls
//!   into async code.

pub mod tasks;
pub mod threads;
mod tracing;
