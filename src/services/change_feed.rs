//! In-process push channel for committed bookmark changes.
//!
//! Plays the part of the server's realtime feed: every committed create or
//! delete is broadcast to all subscribers, and each subscription only surfaces
//! events for the owner it was opened for. Delivery is at-least-once from the
//! subscriber's point of view; publishers are free to repeat an event.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace};

use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeEvent;
use crate::types::errors::FeedError;

#[derive(Debug, Clone)]
struct FeedMessage {
    owner: String,
    event: ChangeEvent,
}

/// Publisher side of the change feed. Cheap to clone.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<FeedMessage>,
    active: Arc<AtomicUsize>,
}

impl ChangeFeed {
    /// Creates a feed that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Opens a subscription that only yields events owned by `owner`.
    pub fn subscribe(&self, owner: &str) -> FeedSubscription {
        let receiver = self.sender.subscribe();
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(owner, active, "change feed subscription acquired");
        FeedSubscription {
            receiver,
            owner: owner.to_string(),
            active: self.active.clone(),
            released: false,
        }
    }

    /// Broadcasts an event for `owner`. Returns how many subscriptions received it.
    pub fn publish(&self, owner: &str, event: ChangeEvent) -> usize {
        trace!(owner, id = event.bookmark_id(), "publishing change");
        self.sender
            .send(FeedMessage {
                owner: owner.to_string(),
                event,
            })
            .unwrap_or(0)
    }

    pub fn publish_created(&self, bookmark: &Bookmark) -> usize {
        self.publish(&bookmark.owner, ChangeEvent::Created(bookmark.clone()))
    }

    pub fn publish_deleted(&self, owner: &str, id: &str) -> usize {
        self.publish(owner, ChangeEvent::Deleted { id: id.to_string() })
    }

    /// Number of subscriptions that have been acquired and not yet released.
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// One owner-scoped subscription to a [`ChangeFeed`].
///
/// Release it with [`FeedSubscription::release`]. Dropping an unreleased
/// subscription releases it as well; either way it is counted out exactly once.
pub struct FeedSubscription {
    receiver: broadcast::Receiver<FeedMessage>,
    owner: String,
    active: Arc<AtomicUsize>,
    released: bool,
}

impl FeedSubscription {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Waits for the next event addressed to this subscription's owner.
    ///
    /// Cancel-safe: no matching event is lost if the future is dropped.
    pub async fn recv(&mut self) -> Result<ChangeEvent, FeedError> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.owner == self.owner => return Ok(message.event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Err(FeedError::Lagged(skipped)),
                Err(RecvError::Closed) => return Err(FeedError::Closed),
            }
        }
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let remaining = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        debug!(owner = %self.owner, remaining, "change feed subscription released");
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.release_once();
    }
}
