//! Full reload of a user's bookmarks from the durable store.

use crate::services::bookmark_store::BookmarkStore;
use crate::types::bookmark::Bookmark;
use crate::types::errors::BookmarkError;

/// Fetches every bookmark `owner` holds, newest first.
///
/// The result is re-sorted here whatever order the store returned.
pub fn load_bookmarks(store: &dyn BookmarkStore, owner: &str) -> Result<Vec<Bookmark>, BookmarkError> {
    let mut records = store
        .list_by_owner(owner)
        .map_err(|e| BookmarkError::RefreshFailed(e.to_string()))?;
    sort_newest_first(&mut records);
    Ok(records)
}

/// Stable sort by descending `created_at`.
pub fn sort_newest_first(records: &mut [Bookmark]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
