//! Reply Hand-off Between Receive and Consumer Threads

use crate::assembler::Reply;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Single-slot mailbox for completed replies
///
/// The producer publishes under the lock and notifies before releasing it;
/// the consumer checks for a reply and decides to wait under the same lock,
/// so a completion is never missed and `id`/`body` are never seen half
/// updated. Holds at most one reply: a newer one replaces an unconsumed one.
#[derive(Debug, Default)]
pub struct ReplySlot {
    pending: Mutex<Option<Reply>>,
    ready: Condvar,
}

impl ReplySlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a completed reply and wake any waiting consumer
    pub fn publish(&self, reply: Reply) {
        let mut pending = self.lock();
        if let Some(stale) = pending.replace(reply) {
            debug!("Overwriting unconsumed reply {:?}", stale.id);
        }
        self.ready.notify_all();
    }

    /// Whether a reply is waiting to be taken
    pub fn is_ready(&self) -> bool {
        self.lock().is_some()
    }

    /// Take the waiting reply, clearing the ready state
    pub fn take(&self) -> Option<Reply> {
        self.lock().take()
    }

    /// Wait up to `timeout` for a reply and take it
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Reply> {
        let pending = self.lock();
        let (mut pending, _) = self
            .ready
            .wait_timeout_while(pending, timeout, |reply| reply.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        pending.take()
    }

    // A panicking holder cannot leave a half-written Option behind
    fn lock(&self) -> MutexGuard<'_, Option<Reply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
