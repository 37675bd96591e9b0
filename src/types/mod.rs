// linkshelf shared type definitions
// Each submodule defines types used across the crate.

pub mod bookmark;
pub mod change;
pub mod errors;
pub mod session;
pub mod settings;
