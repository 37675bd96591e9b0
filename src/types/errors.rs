use std::fmt;

// === BookmarkError ===

/// Errors surfaced to callers of the bookmark view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkError {
    /// A required field was empty; nothing was sent to the store.
    Validation(String),
    /// The store rejected a create. The view is unchanged.
    CreateFailed(String),
    /// The store rejected a delete. The view was resynchronized.
    DeleteFailed(String),
    /// A full reload from the store failed. The view kept its last state.
    RefreshFailed(String),
    /// Another create is still waiting for the store.
    CreateInFlight,
    /// A delete for this bookmark is still waiting for the store.
    DeleteInFlight(String),
    /// The view task has shut down.
    ViewClosed,
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::Validation(msg) => write!(f, "Invalid bookmark: {}", msg),
            BookmarkError::CreateFailed(msg) => write!(f, "Failed to save bookmark: {}", msg),
            BookmarkError::DeleteFailed(msg) => write!(f, "Failed to delete bookmark: {}", msg),
            BookmarkError::RefreshFailed(msg) => {
                write!(f, "Failed to reload bookmarks: {}", msg)
            }
            BookmarkError::CreateInFlight => write!(f, "A bookmark is already being saved"),
            BookmarkError::DeleteInFlight(id) => {
                write!(f, "Bookmark is already being deleted: {}", id)
            }
            BookmarkError::ViewClosed => write!(f, "Bookmark view is closed"),
        }
    }
}

impl std::error::Error for BookmarkError {}

// === StoreError ===

/// Errors reported by a durable bookmark store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No bookmark with the given ID exists for the owner.
    NotFound(String),
    /// Database operation failed.
    DatabaseError(String),
    /// The store could not be reached.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            StoreError::DatabaseError(msg) => write!(f, "Bookmark database error: {}", msg),
            StoreError::Unavailable(msg) => write!(f, "Bookmark store unavailable: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === FeedError ===

/// Errors from a change feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
    /// The feed has no publishers left.
    Closed,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Lagged(n) => write!(f, "Change feed lagged, {} events skipped", n),
            FeedError::Closed => write!(f, "Change feed closed"),
        }
    }
}

impl std::error::Error for FeedError {}

// === SessionError ===

/// Errors related to the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No authenticated user; the view must not run.
    NotAuthenticated,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotAuthenticated => write!(f, "Not authenticated"),
        }
    }
}

impl std::error::Error for SessionError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The specified settings key is invalid.
    InvalidKey(String),
    /// The provided value is invalid for the setting.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => write!(f, "Invalid settings value: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}
