//! RPC method handler for the linkshelf JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested. `handle_method`
//! dispatches one call to a mounted [`ViewHandle`]; `settings.*` calls go to
//! [`handle_settings_method`] instead.

use serde_json::{json, Value};

use crate::managers::bookmark_view::ViewHandle;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::{Bookmark, BookmarkDraft};
use crate::ui::display::{count_label, BookmarkRow};

/// JSON form of the list as the client renders it.
pub fn list_payload(bookmarks: &[Bookmark]) -> Value {
    let rows: Vec<BookmarkRow> = bookmarks.iter().map(BookmarkRow::from).collect();
    json!({
        "count": bookmarks.len(),
        "label": count_label(bookmarks.len()),
        "bookmarks": rows,
    })
}

/// Dispatch a JSON-RPC method call to the view.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(view: &ViewHandle, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Bookmarks ───
        "bookmark.create" => {
            let title = params.get("title").and_then(|v| v.as_str()).ok_or("missing title")?;
            let url = params.get("url").and_then(|v| v.as_str()).ok_or("missing url")?;
            let note = params.get("note").and_then(|v| v.as_str()).unwrap_or("");
            let bookmark = view
                .create(BookmarkDraft::new(title, url, note))
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(&bookmark).map_err(|e| e.to_string())
        }
        "bookmark.delete" => {
            let id = params.get("id").and_then(|v| v.as_str()).ok_or("missing id")?;
            view.delete(id).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "bookmark.list" => Ok(list_payload(&view.snapshot())),
        "bookmark.refresh" => {
            let count = view.refresh().await.map_err(|e| e.to_string())?;
            Ok(json!({"count": count}))
        }

        // ─── Session ───
        "session.status" => {
            let status = view.status().await.map_err(|e| e.to_string())?;
            Ok(json!({
                "user": view.user(),
                "submitting": status.submitting,
                "deleting": status.deleting,
                "count": status.count,
            }))
        }
        _ => Err(format!("unknown method: {}", method)),
    }
}

/// Dispatch a `settings.*` call. Changes are saved immediately and take
/// effect the next time the server starts.
pub fn handle_settings_method(
    engine: &mut dyn SettingsEngineTrait,
    method: &str,
    params: &Value,
) -> Result<Value, String> {
    match method {
        "settings.get" => serde_json::to_value(engine.get_settings()).map_err(|e| e.to_string()),
        "settings.set" => {
            let key = params.get("key").and_then(|v| v.as_str()).ok_or("missing key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            engine.set_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "settings.reset" => {
            engine.reset().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        _ => Err(format!("unknown method: {}", method)),
    }
}
