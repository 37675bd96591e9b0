// linkshelf services
// Collaborators around the bookmark view: durable store, push feed, identity, settings, logging.

pub mod bookmark_store;
pub mod change_feed;
pub mod identity;
pub mod refresh_loader;
pub mod settings_engine;
pub mod telemetry;
