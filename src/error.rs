//! Error types for the rule engine core.
//!
//! Following the taxonomy in the design: [`ParseError`] is the only
//! variant actually propagated to a caller. The rest are constructed,
//! logged, and folded into invalidation state by the component that
//! hits them — they never bubble out of the matcher (see [`crate::matcher`]).

use thiserror::Error;

/// Error produced by the underlying X connection.
///
/// Mirrors `toaruwm::x::core::XError`, narrowed to the handful of
/// variants this crate's [`crate::xconn::XConn`] trait can actually raise.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XError {
    /// The connection itself failed or was never established.
    #[error("X connection error: {0}")]
    Connection(String),

    /// The X server returned an error reply for a request.
    #[error("X server error: {0}")]
    ServerError(String),

    /// A `GetProperty` reply carried data this crate didn't expect.
    #[error("invalid property data: {0}")]
    InvalidPropertyData(String),
}

/// Result type for [`crate::xconn::XConn`] operations.
pub type XResult<T> = ::core::result::Result<T, XError>;

/// Failure while parsing a rule's textual condition language.
///
/// Attached to the offending pattern text, the byte offset the parser
/// had reached, and a human-readable cause. This is the one error
/// type that is fatal for the *single* rule it belongs to; a
/// rule-loader is expected to skip it and keep loading the rest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at offset {offset} in \"{pattern}\": {message}")]
pub struct ParseError {
    /// The full rule text that failed to parse.
    pub pattern: String,
    /// Byte offset into `pattern` where the parser gave up.
    pub offset: usize,
    /// Human-readable description of what went wrong.
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(pattern: impl Into<String>, offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            pattern: pattern.into(),
            offset,
            message: message.into(),
        }
    }
}

/// Atom interning failed during tree postprocessing.
///
/// Never propagated: the leaf that caused it is invalidated
/// (`target_id` left at [`crate::atom::NONE`]) and the matcher treats
/// it as a permanent non-match.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not resolve atom for target \"{target}\": {cause}")]
pub struct ResolveError {
    pub target: String,
    pub cause: String,
}

/// An X11 `GetProperty` round-trip failed or the property grew beyond
/// what the two-phase fetch protocol is willing to retry.
///
/// Never propagated: the affected cell is marked invalid and the
/// matcher returns `false` for any leaf reading it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("X server error fetching property: {0}")]
    Server(#[from] XError),

    #[error("property grew between the sizing and refetch passes")]
    GrewDuringRefetch,
}

/// A PCRE leaf's pattern failed to compile.
///
/// Never propagated: the leaf is invalidated the same way a
/// [`ResolveError`] would invalidate it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to compile regular expression \"{pattern}\": {cause}")]
pub struct RegexCompileError {
    pub pattern: String,
    pub cause: String,
}
