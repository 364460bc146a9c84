//! The five boolean preferences that shape generated links.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;

/// Preservation and injection preferences.
///
/// Missing keys in a stored file fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Keep `_a.filters` in generated links
    pub preserve_filters: bool,
    /// Keep `_g` (time range, refresh interval)
    pub preserve_date_range: bool,
    /// Keep `_a.columns`
    pub preserve_columns: bool,
    /// AND the new expression onto the current query
    pub preserve_query: bool,
    /// Also inject links into results-grid cells
    pub inject_table_links: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preserve_filters: false,
            preserve_date_range: true,
            preserve_columns: true,
            preserve_query: false,
            inject_table_links: false,
        }
    }
}

impl Settings {
    pub fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::PreserveFilters => self.preserve_filters,
            SettingKey::PreserveDateRange => self.preserve_date_range,
            SettingKey::PreserveColumns => self.preserve_columns,
            SettingKey::PreserveQuery => self.preserve_query,
            SettingKey::InjectTableLinks => self.inject_table_links,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: bool) {
        let slot = match key {
            SettingKey::PreserveFilters => &mut self.preserve_filters,
            SettingKey::PreserveDateRange => &mut self.preserve_date_range,
            SettingKey::PreserveColumns => &mut self.preserve_columns,
            SettingKey::PreserveQuery => &mut self.preserve_query,
            SettingKey::InjectTableLinks => &mut self.inject_table_links,
        };
        *slot = value;
    }
}

/// Name of one setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    PreserveFilters,
    PreserveDateRange,
    PreserveColumns,
    PreserveQuery,
    InjectTableLinks,
}

impl SettingKey {
    pub const ALL: [SettingKey; 5] = [
        SettingKey::PreserveFilters,
        SettingKey::PreserveDateRange,
        SettingKey::PreserveColumns,
        SettingKey::PreserveQuery,
        SettingKey::InjectTableLinks,
    ];

    /// Stored name (camelCase, as in the settings file)
    pub fn name(self) -> &'static str {
        match self {
            SettingKey::PreserveFilters => "preserveFilters",
            SettingKey::PreserveDateRange => "preserveDateRange",
            SettingKey::PreserveColumns => "preserveColumns",
            SettingKey::PreserveQuery => "preserveQuery",
            SettingKey::InjectTableLinks => "injectTableLinks",
        }
    }

    pub fn default_value(self) -> bool {
        Settings::default().get(self)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown setting '{0}'")]
pub struct UnknownSetting(pub String);

impl FromStr for SettingKey {
    type Err = UnknownSetting;

    /// Accepts the stored camelCase name or its kebab-case form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        SettingKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownSetting(s.to_string()))
    }
}

/// One changed setting, as broadcast by a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub value: bool,
}

/// Settings snapshot shared between the detector's tasks.
///
/// Readers copy the whole record, so a link is always built from one
/// consistent set of flags.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings(Rc<Cell<Settings>>);

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self(Rc::new(Cell::new(settings)))
    }

    pub fn get(&self) -> Settings {
        self.0.get()
    }

    pub fn apply(&self, change: SettingChange) {
        let mut settings = self.0.get();
        settings.set(change.key, change.value);
        self.0.set(settings);
    }
}
