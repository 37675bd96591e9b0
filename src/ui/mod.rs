//! Render-time helpers for presenting bookmarks.
//!
//! Nothing here is persisted; stored bookmarks keep their fields exactly as entered.

pub mod display;
