//! Counted completion.
//!
//! A completion channel of size N hands out N single-use senders, one per
//! driver. The receiver knows how many signals are still outstanding, so
//! the executor can tell a finished run from a driver that vanished.

use tokio::sync::mpsc;

/// One signal: which sender fired and what it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion<T> {
    /// Index of the sender, in creation order
    pub index: usize,
    /// Payload passed to [`CompletionSender::signal`]
    pub value: T,
}

/// Create `count` senders and their receiver.
#[must_use]
pub fn completion_channel<T>(count: usize) -> (Vec<CompletionSender<T>>, CompletionReceiver<T>) {
    // capacity == count, so a signal never waits
    let (tx, rx) = mpsc::channel(count.max(1));
    let senders = (0..count).map(|index| CompletionSender { index, tx: tx.clone() }).collect();
    (senders, CompletionReceiver { rx, outstanding: count })
}

/// Single-use sending half.
#[derive(Debug)]
pub struct CompletionSender<T> {
    index: usize,
    tx: mpsc::Sender<Completion<T>>,
}

impl<T> CompletionSender<T> {
    /// Index of this sender.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Report completion. Returns `false` if the receiver is gone.
    pub fn signal(self, value: T) -> bool {
        self.tx.try_send(Completion { index: self.index, value }).is_ok()
    }
}

/// Receiving half.
#[derive(Debug)]
pub struct CompletionReceiver<T> {
    rx: mpsc::Receiver<Completion<T>>,
    outstanding: usize,
}

impl<T> CompletionReceiver<T> {
    /// Next signal. `None` once every sender has either signalled or been
    /// dropped; check [`is_complete`](Self::is_complete) to tell which.
    pub async fn recv(&mut self) -> Option<Completion<T>> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.rx.recv().await?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// A signal that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<Completion<T>> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.rx.try_recv().ok()?;
        self.outstanding -= 1;
        Some(completion)
    }

    /// Signals not yet received.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Whether every sender has signalled.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.outstanding == 0
    }
}
