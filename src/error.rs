//! Error types for hash-state decoding, URL building and viewer scanning.

use std::time::Duration;
use thiserror::Error;

/// Errors produced while parsing a single rison value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RisonError {
    /// Input (or a nested value) was empty.
    #[error("empty expression at {pos}")]
    Empty { pos: usize },

    /// A character that cannot start a value.
    #[error("invalid character '{ch}' at {pos}")]
    InvalidCharacter { ch: char, pos: usize },

    /// `!` followed by something other than `t`, `f`, `n`, `(` or `!`.
    #[error("unknown literal '!{ch}' at {pos}")]
    UnknownLiteral { ch: char, pos: usize },

    /// Quoted string without its closing quote.
    #[error("unmatched quote starting at {pos}")]
    UnterminatedString { pos: usize },

    /// `!` inside a quoted string not followed by `!` or `'`.
    #[error("invalid string escape at {pos}")]
    InvalidEscape { pos: usize },

    /// A lone `-` or malformed exponent.
    #[error("invalid number at {pos}")]
    InvalidNumber { pos: usize },

    /// Map or sequence ran off the end of input.
    #[error("unterminated {kind} starting at {pos}")]
    Unterminated { kind: &'static str, pos: usize },

    #[error("missing ',' at {pos}")]
    MissingComma { pos: usize },

    #[error("extra ',' at {pos}")]
    ExtraComma { pos: usize },

    #[error("missing ':' at {pos}")]
    MissingColon { pos: usize },

    /// Map key that is not a string or number.
    #[error("bad map key at {pos}")]
    BadKey { pos: usize },

    /// Input continues after a complete value.
    #[error("unexpected trailing input at {pos}")]
    TrailingInput { pos: usize },
}

/// A hash parameter whose value is not valid rison.
///
/// The host dashboard never produces such segments, so the URL either
/// belongs to another application or was edited by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed hash state at key '{key}': {reason}")]
pub struct MalformedHashState {
    pub key: String,
    #[source]
    pub reason: RisonError,
}

/// Errors produced when building a [`crate::dashboard_url::DashboardUrl`].
#[derive(Debug, Error)]
pub enum DashboardUrlError {
    #[error("invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Malformed(#[from] MalformedHashState),
}

/// Errors from the bounded viewer poll.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// The container never rendered rows within the wait budget.
    #[error("viewer rendered no rows within {waited:?}")]
    ViewerPollTimeout { waited: Duration },
}

/// Why a candidate row was left untouched. Not an error: partial extraction
/// is normal (binary fields render no text, for example).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("row has no parseable field name")]
    MissingFieldName,

    #[error("row has no text content")]
    EmptyValue,

    #[error("row already carries an injected link")]
    AlreadyInjected,

    #[error("link builder produced no link")]
    NoLink,
}
