//! Parsed dashboard page URL and the filter-link builder.

use crate::config::settings::Settings;
use crate::constants::hash::{
    APP_STATE, DISCOVER_KEYS, DISCOVER_PATH, DOC_PATH_PREFIX, GLOBAL_STATE, QUERY_JOINER,
    QUERY_LANGUAGE, QUERY_STATE,
};
use crate::error::DashboardUrlError;
use crate::hash_state::{self, HashState, Value};
use tracing::{debug, warn};
use url::Url;

/// One requested filter plus the preservation choices that shape the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilterRequest {
    pub field_name: String,
    pub field_value: String,
    pub preserve_filters: bool,
    pub preserve_date_range: bool,
    pub preserve_columns: bool,
    pub preserve_query: bool,
}

impl FieldFilterRequest {
    /// Request with the preservation flags taken from the user's settings
    pub fn from_settings(
        field_name: impl Into<String>,
        field_value: impl Into<String>,
        settings: &Settings,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: field_value.into(),
            preserve_filters: settings.preserve_filters,
            preserve_date_range: settings.preserve_date_range,
            preserve_columns: settings.preserve_columns,
            preserve_query: settings.preserve_query,
        }
    }

    /// Query-language expression for this field: `name:"value"`
    pub fn expression(&self) -> String {
        format!("{}:\"{}\"", self.field_name, self.field_value)
    }
}

/// A dashboard page URL with its hash split into path and decoded state.
#[derive(Debug, Clone)]
pub struct DashboardUrl {
    url: Url,
    hash_path: String,
    state: HashState,
}

impl DashboardUrl {
    /// Parse a page URL. Fails when the URL is invalid or the hash query does
    /// not decode.
    pub fn parse(raw: &str) -> Result<Self, DashboardUrlError> {
        let (url, hash_path, params) = split(raw)?;
        let state = hash_state::decode(&params)?;
        Ok(Self {
            url,
            hash_path,
            state,
        })
    }

    /// Parse a page URL, treating an undecodable hash query as empty state.
    ///
    /// The link still filters on the clicked value; only preservation is lost.
    pub fn parse_lenient(raw: &str) -> Result<Self, url::ParseError> {
        let (url, hash_path, params) = split(raw)?;
        let state = hash_state::decode(&params).unwrap_or_else(|err| {
            warn!(error = %err, "Ignoring undecodable hash state");
            HashState::new()
        });
        Ok(Self {
            url,
            hash_path,
            state,
        })
    }

    /// Hash path including the leading `#`, e.g. `#/` or `#/doc/logs/idx`
    pub fn hash_path(&self) -> &str {
        &self.hash_path
    }

    pub fn state(&self) -> &HashState {
        &self.state
    }

    /// Whether this is the single-document view
    pub fn is_doc_page(&self) -> bool {
        self.hash_path.starts_with(DOC_PATH_PREFIX)
    }

    /// Build a link to the same dashboard filtered on the requested field
    /// value. Origin, path and search are kept; `self` is not modified.
    pub fn build_filter_url(&self, request: &FieldFilterRequest) -> String {
        let mut state = self.state.clone();
        let doc_page = self.is_doc_page();
        if doc_page {
            state.retain_keys(&DISCOVER_KEYS);
        }

        let expression = request.expression();
        let query = match request.preserve_query.then(|| existing_query(&state)).flatten() {
            Some(existing) => format!("{existing}{QUERY_JOINER}{expression}"),
            None => expression,
        };
        for key in [APP_STATE, QUERY_STATE] {
            state.object_entry(key).insert("query".to_string(), query_value(&query));
        }

        if !request.preserve_filters {
            state.object_entry(APP_STATE).shift_remove("filters");
        }
        if !request.preserve_columns {
            state.object_entry(APP_STATE).shift_remove("columns");
        }
        if !request.preserve_date_range {
            state.remove(GLOBAL_STATE);
        }

        let hash_path = if doc_page {
            DISCOVER_PATH
        } else {
            self.hash_path.as_str()
        };
        let fragment = format!(
            "{}?{}",
            hash_path.strip_prefix('#').unwrap_or(hash_path),
            hash_state::encode(&state)
        );

        let mut url = self.url.clone();
        url.set_fragment(Some(&fragment));
        debug!(field = %request.field_name, doc_page, "Built filter link");
        url.into()
    }
}

/// Split a URL into the parsed URL, the hash path and the raw hash query
fn split(raw: &str) -> Result<(Url, String, String), url::ParseError> {
    let url = Url::parse(raw)?;
    let (hash_path, params) = match url.fragment().filter(|f| !f.is_empty()) {
        Some(fragment) => match fragment.split_once('?') {
            Some((path, params)) => (format!("#{path}"), params.to_string()),
            None => (format!("#{fragment}"), String::new()),
        },
        None => (DISCOVER_PATH.to_string(), String::new()),
    };
    Ok((url, hash_path, params))
}

/// Current free-text query: app state first, query state as fallback.
/// Empty strings count as no query.
fn existing_query(state: &HashState) -> Option<String> {
    [APP_STATE, QUERY_STATE].into_iter().find_map(|key| {
        state
            .get(key)?
            .get("query")?
            .get("query")?
            .as_str()
            .filter(|q| !q.is_empty())
            .map(str::to_owned)
    })
}

fn query_value(query: &str) -> Value {
    [
        ("language", Value::from(QUERY_LANGUAGE)),
        ("query", Value::from(query)),
    ]
    .into_iter()
    .collect()
}
