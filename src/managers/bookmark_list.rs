//! Reconciling state container for one user's bookmarks.
//!
//! Every producer (push feed, mutation outcomes, full reloads) writes through
//! the three operations here. `upsert_if_absent` and `remove` are idempotent,
//! so the same logical change may be applied any number of times, from any
//! source, without corrupting the list.

use std::collections::HashSet;

use tracing::{trace, warn};

use crate::services::refresh_loader::sort_newest_first;
use crate::types::bookmark::Bookmark;

/// Ordered, duplicate-free list of the bookmarks one user is known to hold.
///
/// Invariants: ids are unique, `created_at` is non-increasing front to back,
/// and every record's `owner` equals [`BookmarkList::owner`].
#[derive(Debug, Clone)]
pub struct BookmarkList {
    owner: String,
    records: Vec<Bookmark>,
}

impl BookmarkList {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            records: Vec::new(),
        }
    }

    /// Creates a list seeded with `records`, applying the same rules as
    /// [`BookmarkList::replace_all`].
    pub fn with_records(owner: impl Into<String>, records: Vec<Bookmark>) -> Self {
        let mut list = Self::new(owner);
        list.replace_all(records);
        list
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Inserts `record` unless a record with the same id is already held.
    ///
    /// The insertion point keeps newest-first order; among equal timestamps
    /// the newcomer goes first. Records owned by another user are refused.
    /// Returns whether an insertion happened.
    pub fn upsert_if_absent(&mut self, record: Bookmark) -> bool {
        if record.owner != self.owner {
            warn!(id = %record.id, owner = %record.owner, "refusing bookmark owned by another user");
            return false;
        }
        if self.contains(&record.id) {
            trace!(id = %record.id, "bookmark already held");
            return false;
        }
        let at = self
            .records
            .partition_point(|held| held.created_at > record.created_at);
        self.records.insert(at, record);
        true
    }

    /// Removes the record with `id`. Absent ids are not an error.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.records.iter().position(|b| b.id == id) {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces the contents with `records`, newest first.
    ///
    /// Foreign-owned records are dropped and repeated ids keep their first
    /// occurrence.
    pub fn replace_all(&mut self, records: Vec<Bookmark>) {
        let received = records.len();
        let mut seen = HashSet::new();
        let mut kept: Vec<Bookmark> = records
            .into_iter()
            .filter(|r| r.owner == self.owner)
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        if kept.len() != received {
            warn!(
                dropped = received - kept.len(),
                "discarded foreign or duplicate bookmarks during replace"
            );
        }
        sort_newest_first(&mut kept);
        self.records = kept;
    }

    pub fn get(&self, id: &str) -> Option<&Bookmark> {
        self.records.iter().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Bookmark] {
        &self.records
    }

    pub fn to_vec(&self) -> Vec<Bookmark> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
