#![forbid(unsafe_code)]
//! Turns field values shown in Kibana and OpenSearch Dashboards document
//! viewers into links that reopen Discover filtered on that value.

pub mod config;
pub mod constants;
pub mod dashboard_url;
pub mod detector;
pub mod dom;
pub mod error;
pub mod hash_state;
pub mod link;
pub mod registry;
pub mod scanner;
pub mod throttle;
pub mod variant;
