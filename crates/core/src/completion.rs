// One-shot completion token
//
// A `Completer` resolves its paired `Pending` at most once. Dropping an
// unresolved completer fails the waiter with `SessionClosed`.

use crate::error::{AudioError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

pub fn completion<T>() -> (Completer<T>, Pending<T>) {
    let (tx, rx) = bounded(1);
    (Completer { tx: Some(tx) }, Pending { rx })
}

/// Resolving side
#[derive(Debug)]
pub struct Completer<T> {
    tx: Option<Sender<Result<T>>>,
}

impl<T> Completer<T> {
    /// Resolve the waiter; returns false if this token was already consumed
    pub fn complete(&mut self, value: Result<T>) -> bool {
        match self.tx.take() {
            Some(tx) => {
                // The waiter may have given up already
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Waiting side
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block until resolved
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or_else(|_| Err(closed()))
    }

    /// Block up to `timeout`; `None` if still unresolved
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(closed())),
        }
    }

    /// Non-blocking poll
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(closed())),
        }
    }
}

fn closed() -> AudioError {
    AudioError::SessionClosed("completion dropped before it was resolved".to_string())
}
