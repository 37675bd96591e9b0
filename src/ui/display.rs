use chrono::{DateTime, Utc};

use crate::types::bookmark::Bookmark;

/// Link target for a bookmark. Adds `https://` when the stored url has no
/// http(s) scheme.
pub fn display_href(target: &str) -> String {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{}", target)
    }
}

/// Formats a creation timestamp (Unix milliseconds) as e.g. `Feb 3, 2025`, in UTC.
///
/// Out-of-range timestamps yield an empty string.
pub fn format_created_date(created_at_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(created_at_ms)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_default()
}

/// `"1 bookmark saved"`, `"3 bookmarks saved"`.
pub fn count_label(count: usize) -> String {
    if count == 1 {
        "1 bookmark saved".to_string()
    } else {
        format!("{} bookmarks saved", count)
    }
}

/// One row of the list as the presentation layer draws it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BookmarkRow {
    pub id: String,
    pub title: String,
    pub href: String,
    pub url: String,
    pub note: Option<String>,
    pub date: String,
}

impl From<&Bookmark> for BookmarkRow {
    fn from(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.clone(),
            title: bookmark.title.clone(),
            href: display_href(&bookmark.target),
            url: bookmark.target.clone(),
            note: bookmark.has_note().then(|| bookmark.note.clone()),
            date: format_created_date(bookmark.created_at),
        }
    }
}
