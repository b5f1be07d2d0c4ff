//! Single-use reply channel backed by crossbeam, which offers `recv_timeout`
//! on a bounded queue of one.

pub use crossbeam::channel::{RecvTimeoutError, SendError};

pub struct Sender<T>(crossbeam::channel::Sender<T>);

pub struct Receiver<T>(crossbeam::channel::Receiver<T>);

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = crossbeam::channel::bounded(1);
    (Sender(tx), Receiver(rx))
}

impl<T> Sender<T> {
    pub fn send(self, value: T) -> Result<(), SendError<T>> {
        self.0.send(value)
    }
}

impl<T> Receiver<T> {
    pub fn recv_timeout(self, timeout: std::time::Duration) -> Result<T, RecvTimeoutError> {
        self.0.recv_timeout(timeout)
    }
}

impl<T> std::fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("oneshot::Sender").finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("oneshot::Receiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delivers_value_across_threads() {
        let (tx, rx) = channel();
        std::thread::spawn(move || tx.send(7u32).unwrap());
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 7);
    }

    #[test]
    fn dropped_sender_disconnects() {
        let (tx, rx) = channel::<u32>();
        drop(tx);
        assert!(rx.recv_timeout(Duration::from_millis(50)).unwrap_err().is_disconnected());
    }

    #[test]
    fn silent_sender_times_out() {
        let (_tx, rx) = channel::<u32>();
        assert!(rx.recv_timeout(Duration::from_millis(20)).unwrap_err().is_timeout());
    }
}
