//! Per-recipient mailboxes
//!
//! Envelopes are queued FIFO under their recipient's id. A pull removes the
//! whole queue in one step, so each envelope is handed out at most once.
//! Queues are unbounded and never expire.

use std::collections::HashMap;
use std::sync::Arc;

use courier_core::Envelope;
use tokio::sync::RwLock;

/// Shared handle to all mailboxes
#[derive(Clone, Default)]
pub struct MailboxRelay {
    queues: Arc<RwLock<HashMap<String, Vec<Envelope>>>>,
}

impl MailboxRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `envelope` to `recipient_id`'s queue, creating it if needed.
    ///
    /// Returns the queue depth after the append.
    pub async fn enqueue(&self, recipient_id: &str, envelope: Envelope) -> usize {
        let mut queues = self.queues.write().await;
        let queue = queues.entry(recipient_id.to_string()).or_default();
        queue.push(envelope);
        queue.len()
    }

    /// Remove and return everything queued for `user_id`, oldest first
    pub async fn drain_all(&self, user_id: &str) -> Vec<Envelope> {
        self.queues
            .write()
            .await
            .remove(user_id)
            .unwrap_or_default()
    }

    /// Number of envelopes waiting for `user_id`
    pub async fn pending(&self, user_id: &str) -> usize {
        self.queues
            .read()
            .await
            .get(user_id)
            .map_or(0, Vec::len)
    }

    /// Number of recipients with a non-empty queue
    pub async fn mailbox_count(&self) -> usize {
        self.queues.read().await.len()
    }
}
