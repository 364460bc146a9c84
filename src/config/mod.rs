//! User settings for link generation
//!
//! This module provides two layers:
//! - **settings**: the [`Settings`] record, its keys and the shared snapshot the
//!   link builder reads
//! - **store**: asynchronous persistence with change notifications

pub mod settings;
pub mod store;

// Re-export commonly used types
pub use settings::{SettingChange, SettingKey, Settings, SharedSettings};
pub use store::{JsonFileStore, MemoryStore, SettingsStore, load_settings, spawn_settings_sync};
