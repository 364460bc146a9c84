//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Attributes and classes written into the host page
pub mod marker {
    /// Class carried by every injected anchor (also the idempotence marker)
    pub const LINK_CLASS: &str = "kibana-clicker-link";

    /// Class added to a flyout row once its content was replaced by a link
    pub const ROW_CLASS: &str = "kibana-clicker-row";

    /// Attribute set on a viewer container after its rows were injected
    pub const CONTAINER_ATTR: &str = "data-kibana-clicker-injected";
}

/// Anchor attributes for injected links
pub mod link {
    pub const TARGET: &str = "_blank";
    pub const REL: &str = "noreferrer noopener";
}

/// Row discovery inside document viewers and result grids
pub mod rows {
    /// Attribute the host framework uses to tag test subjects
    pub const TEST_SUBJ_ATTR: &str = "data-test-subj";

    /// Flyout rows are tagged `tableDocViewRow-<field>-value`
    pub const ROW_PREFIX: &str = "tableDocViewRow-";
    pub const ROW_SUFFIX: &str = "-value";

    /// Description list rendered inside a results-grid cell
    pub const GRID_LIST_TEST_SUBJ: &str = "discoverCellDescriptionList";

    /// Label/value element tags inside a grid description list
    pub const GRID_LABEL_TAG: &str = "dt";
    pub const GRID_VALUE_TAG: &str = "dd";
}

/// Kibana detection constants
pub mod kibana {
    /// Id of the body element Kibana renders into
    pub const ROOT_ID: &str = "kibana-body";

    /// Doc viewer test subject (Kibana 8+)
    pub const VIEWER_TEST_SUBJ: &str = "kbnDocViewer";

    /// Doc viewer class (older Kibana)
    pub const VIEWER_CLASS: &str = "kbnDocViewer";
}

/// OpenSearch Dashboards detection constants
pub mod opensearch {
    pub const ROOT_ID: &str = "opensearch-dashboards-body";
    pub const VIEWER_CLASS: &str = "osdDocViewer";
}

/// Hash-state keys and Discover routing
pub mod hash {
    /// App state: query, filters, columns, sort
    pub const APP_STATE: &str = "_a";

    /// Global state: time range and refresh interval
    pub const GLOBAL_STATE: &str = "_g";

    /// Query state mirror read by OpenSearch Dashboards
    pub const QUERY_STATE: &str = "_q";

    /// Keys that remain meaningful on the Discover list view
    pub const DISCOVER_KEYS: [&str; 3] = [APP_STATE, GLOBAL_STATE, QUERY_STATE];

    /// Single document view prefix (`#/doc/<dataViewId>/<index>`)
    pub const DOC_PATH_PREFIX: &str = "#/doc/";

    /// Discover list view prefix
    pub const DISCOVER_PATH: &str = "#/";

    pub const QUERY_LANGUAGE: &str = "kuery";
    pub const QUERY_JOINER: &str = " AND ";
}

/// Scheduling constants
pub mod timing {
    use std::time::Duration;

    /// Mutation handler fires at most once per quantum
    pub const MUTATION_QUANTUM: Duration = Duration::from_millis(100);

    /// Delay between row lookups while a viewer is still rendering
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Give up on a viewer that renders no rows within this budget
    pub const POLL_MAX_WAIT: Duration = Duration::from_secs(10);
}

/// Settings file location
pub mod config {
    pub const APP_DIR: &str = "kibana-clicker";
    pub const FILENAME: &str = "settings.json";
}
