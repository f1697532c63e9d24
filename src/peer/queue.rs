//! Peer queue
//!
//! Unbounded FIFO that feeds tracker peers to workers. Unlike a channel it
//! can be drained and refilled on re-announce while workers are waiting on
//! it.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::debug;

use crate::peer::state::PeerInfo;

/// Item handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// Connect to this peer
    Connect(PeerInfo),
    /// Shut the worker down
    Stop,
}

/// Shared queue of peers waiting for a worker
#[derive(Debug, Default)]
pub struct PeerQueue {
    items: Mutex<VecDeque<PeerMessage>>,
    notify: Notify,
}

impl PeerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message and wake a waiting worker
    pub fn push(&self, message: PeerMessage) {
        self.lock().push_back(message);
        self.notify.notify_one();
    }

    /// Wait for the next message
    pub async fn pop(&self) -> PeerMessage {
        loop {
            let notified = self.notify.notified();
            if let Some(message) = self.try_pop() {
                return message;
            }
            notified.await;
        }
    }

    /// Take the next message if there is one
    pub fn try_pop(&self) -> Option<PeerMessage> {
        let mut items = self.lock();
        let message = items.pop_front();
        if message.is_some() && !items.is_empty() {
            self.notify.notify_one();
        }
        message
    }

    /// Replace every queued peer with `peers`.
    ///
    /// Pending `Stop` messages are kept at the front.
    pub fn replace(&self, peers: impl IntoIterator<Item = PeerInfo>) {
        let mut items = self.lock();
        items.retain(|m| matches!(m, PeerMessage::Stop));
        items.extend(peers.into_iter().map(PeerMessage::Connect));
        debug!("Peer queue refilled with {} entries", items.len());
        if !items.is_empty() {
            self.notify.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PeerMessage>> {
        // The lock is never held across an await or a panic point.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
