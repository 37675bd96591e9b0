use serde::{Deserialize, Serialize};

use super::errors::BookmarkError;

/// A saved link owned by a single user.
///
/// `id` and `created_at` are assigned by the durable store; the client never
/// mints either. `target` is kept exactly as the user typed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub owner: String,
    pub title: String,
    #[serde(rename = "url")]
    pub target: String,
    #[serde(default)]
    pub note: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl Bookmark {
    /// Returns true if the bookmark carries a non-empty note.
    pub fn has_note(&self) -> bool {
        !self.note.is_empty()
    }
}

/// User input for a new bookmark, before the store has accepted it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkDraft {
    pub title: String,
    #[serde(rename = "url")]
    pub target: String,
    #[serde(default)]
    pub note: String,
}

impl BookmarkDraft {
    pub fn new(title: impl Into<String>, target: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target: target.into(),
            note: note.into(),
        }
    }

    /// Returns a trimmed copy of the draft.
    ///
    /// # Errors
    /// Returns `BookmarkError::Validation` if the trimmed title or target is empty.
    pub fn normalized(&self) -> Result<BookmarkDraft, BookmarkError> {
        let title = self.title.trim();
        let target = self.target.trim();
        if title.is_empty() {
            return Err(BookmarkError::Validation("title is required".to_string()));
        }
        if target.is_empty() {
            return Err(BookmarkError::Validation("url is required".to_string()));
        }
        Ok(BookmarkDraft {
            title: title.to_string(),
            target: target.to_string(),
            note: self.note.trim().to_string(),
        })
    }
}
