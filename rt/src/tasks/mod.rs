//! Tokio reexports to prevent tokio dependencies within external code.
//!
//! Only the pieces needed to hand blocking work off an async executor are
//! exposed. We may want to extend this as needed.

pub mod oneshot;

pub use tokio::task::spawn_blocking;
