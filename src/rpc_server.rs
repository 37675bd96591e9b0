//! linkshelf RPC server: JSON-RPC over stdin/stdout.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.create", "params":{"title":"...","url":"..."}}
//!           {"id":2, "method":"settings.set", "params":{"key":"feed.capacity","value":512}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Event:    {"event":"bookmarks", "count":2, "label":"2 bookmarks saved", "bookmarks":[...]}

use std::io::{self, Write};

use linkshelf::app::App;
use linkshelf::rpc_handler::{handle_method, handle_settings_method, list_payload};
use linkshelf::services::identity::StaticIdentity;
use linkshelf::services::settings_engine::{data_dir, SettingsEngine, SettingsEngineTrait};
use linkshelf::services::telemetry;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

const USER_ENV: &str = "LINKSHELF_USER";
const EMAIL_ENV: &str = "LINKSHELF_EMAIL";

fn emit(value: &Value) {
    let mut stdout = io::stdout().lock();
    // Nothing useful to do if the client hung up.
    let _ = writeln!(stdout, "{}", value);
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() {
    let mut engine = SettingsEngine::new(None);
    let mut settings = match engine.load() {
        Ok(settings) => settings,
        Err(e) => {
            emit(&json!({"event":"error","error":e.to_string()}));
            std::process::exit(1);
        }
    };
    telemetry::init(&settings.logging.filter);

    // A relative database path is resolved against the data directory.
    let db_path = std::path::Path::new(&settings.storage.database_path);
    if db_path.is_relative() {
        settings.storage.database_path = data_dir().join(db_path).to_string_lossy().to_string();
    }

    let identity = StaticIdentity::from_env(USER_ENV, EMAIL_ENV);
    let app = match App::new(settings, Box::new(identity)) {
        Ok(app) => app,
        Err(e) => {
            emit(&json!({"event":"error","error":format!("failed to initialize: {}", e)}));
            std::process::exit(1);
        }
    };
    let view = match app.mount_view() {
        Ok(view) => view,
        Err(e) => {
            emit(&json!({"event":"error","error":e.to_string()}));
            std::process::exit(1);
        }
    };

    emit(&json!({"event":"ready","version":env!("CARGO_PKG_VERSION"),"user":view.user()}));

    let mut changes = view.subscribe_changes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => break,
                };
                if line.trim().is_empty() { continue; }

                let req: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        emit(&json!({"id":null,"error":format!("parse error: {}", e)}));
                        continue;
                    }
                };

                let id = req.get("id").cloned().unwrap_or(Value::Null);
                let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
                let params = req.get("params").cloned().unwrap_or(json!({}));

                let result = if method.starts_with("settings.") {
                    handle_settings_method(&mut engine, method, &params)
                } else {
                    handle_method(&view, method, &params).await
                };
                let response = match result {
                    Ok(val) => json!({"id": id, "result": val}),
                    Err(err) => json!({"id": id, "error": err}),
                };
                emit(&response);
            }
            changed = changes.changed() => {
                if changed.is_err() { break; }
                let mut payload = list_payload(&changes.borrow_and_update());
                payload["event"] = json!("bookmarks");
                emit(&payload);
            }
        }
    }

    view.unmount().await;
}
