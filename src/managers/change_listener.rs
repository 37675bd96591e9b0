//! Applies push notifications to the bookmark list.

use tracing::{debug, warn};

use crate::managers::bookmark_list::BookmarkList;
use crate::services::change_feed::FeedSubscription;
use crate::types::change::ChangeEvent;
use crate::types::errors::FeedError;

/// What the listener has to report to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSignal {
    Change(ChangeEvent),
    /// Events were dropped; the view should reload to catch up.
    Lagged(u64),
}

/// Holds the view's single feed subscription for as long as the view is mounted.
pub struct ChangeListener {
    subscription: Option<FeedSubscription>,
    closed: bool,
}

impl ChangeListener {
    pub fn new(subscription: FeedSubscription) -> Self {
        Self {
            subscription: Some(subscription),
            closed: false,
        }
    }

    /// Waits for the next signal from the feed.
    ///
    /// Once the feed closes or the subscription is released this never
    /// resolves, so it can stay in a `select!` without spinning.
    pub async fn next_signal(&mut self) -> ListenerSignal {
        if self.closed {
            return std::future::pending().await;
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        match subscription.recv().await {
            Ok(event) => ListenerSignal::Change(event),
            Err(FeedError::Lagged(skipped)) => {
                warn!(skipped, "change feed lagged");
                ListenerSignal::Lagged(skipped)
            }
            Err(FeedError::Closed) => {
                warn!("change feed closed; no further push updates");
                self.closed = true;
                std::future::pending().await
            }
        }
    }

    /// Applies one push event to `list`. Returns whether the list changed.
    pub fn apply(list: &mut BookmarkList, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::Created(bookmark) => {
                let id = bookmark.id.clone();
                let inserted = list.upsert_if_absent(bookmark);
                debug!(%id, inserted, "push create");
                inserted
            }
            ChangeEvent::Deleted { id } => {
                let removed = list.remove(&id);
                debug!(%id, removed, "push delete");
                removed
            }
        }
    }

    /// Releases the subscription. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        match self.subscription.take() {
            Some(subscription) => {
                subscription.release();
                true
            }
            None => false,
        }
    }
}
