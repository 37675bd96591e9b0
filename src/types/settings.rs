use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub view: ViewSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Durable store location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    pub database_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "linkshelf.db".to_string(),
        }
    }
}

/// Push channel sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSettings {
    /// Events buffered per subscriber before it is reported as lagged.
    pub capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewSettings {
    pub command_buffer: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self { command_buffer: 64 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "linkshelf=info".to_string(),
        }
    }
}
