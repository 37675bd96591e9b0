//! App core for linkshelf.
//!
//! Wires configuration, the durable store, the change feed and the signed-in
//! user together, and mounts bookmark views on top of them.

use std::sync::Arc;

use tracing::info;

use crate::database::Database;
use crate::managers::bookmark_view::{BookmarkView, ViewHandle};
use crate::services::bookmark_store::{BookmarkStore, SqliteStore};
use crate::services::change_feed::ChangeFeed;
use crate::services::identity::IdentityProvider;
use crate::types::errors::SessionError;
use crate::types::settings::SyncSettings;

/// Central struct holding the collaborators a view needs.
pub struct App {
    pub settings: SyncSettings,
    pub feed: ChangeFeed,
    pub store: Arc<dyn BookmarkStore>,
    pub identity: Box<dyn IdentityProvider>,
}

impl App {
    /// Opens the database named in `settings` and connects a store to a fresh feed.
    pub fn new(
        settings: SyncSettings,
        identity: Box<dyn IdentityProvider>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Database::open(&settings.storage.database_path)?;
        info!(path = %settings.storage.database_path, "database opened");
        Ok(Self::with_database(settings, identity, db))
    }

    /// Same as [`App::new`] over an already opened database.
    pub fn with_database(
        settings: SyncSettings,
        identity: Box<dyn IdentityProvider>,
        db: Database,
    ) -> Self {
        let feed = ChangeFeed::new(settings.feed.capacity);
        let store: Arc<dyn BookmarkStore> = Arc::new(SqliteStore::with_feed(db, feed.clone()));
        Self {
            settings,
            feed,
            store,
            identity,
        }
    }

    /// Mounts a view for the current user, starting from an empty list.
    pub fn mount_view(&self) -> Result<ViewHandle, SessionError> {
        BookmarkView::mount(
            self.identity.as_ref(),
            self.store.clone(),
            &self.feed,
            &self.settings.view,
            Vec::new(),
        )
    }
}
