use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;

/// A committed mutation as delivered by the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Created(Bookmark),
    Deleted { id: String },
}

impl ChangeEvent {
    /// The id of the bookmark this event concerns.
    pub fn bookmark_id(&self) -> &str {
        match self {
            ChangeEvent::Created(bookmark) => &bookmark.id,
            ChangeEvent::Deleted { id } => id,
        }
    }
}
