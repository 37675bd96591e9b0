//! linkshelf: per-user saved links kept consistent across concurrent sessions.
//!
//! The heart of the crate is [`managers::bookmark_view`], which reconciles
//! optimistic local mutations with an at-least-once push feed into one
//! duplicate-free, newest-first list.

pub mod app;
pub mod database;
pub mod managers;
pub mod rpc_handler;
pub mod services;
pub mod types;
pub mod ui;
