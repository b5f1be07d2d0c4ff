//! non-async replacement for mpsc channels

pub use std::sync::mpsc::{channel as unbounded_channel, Receiver, SendError, Sender};
