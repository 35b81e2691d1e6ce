//! Error types for the streaming parser.
//!
//! `XPathStaxError` is the single error surfaced by the library. Handler
//! callbacks report failures as [`BoxError`], which the dispatcher wraps
//! with the path of the element being processed.

use thiserror::Error;

/// Boxed error returned by handler callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the xpathstax library.
#[derive(Debug, Error)]
pub enum XPathStaxError {
    /// The XML tokenizer failed to lex the input.
    #[error("XML tokenizer failed: {0}")]
    Tokenizer(#[from] quick_xml::Error),

    /// The input ended while elements were still open.
    #[error("Unexpected end of document inside {path}")]
    UnexpectedEof { path: String },

    /// An end-element does not close the innermost open element.
    #[error("End element </{found}> does not match {}", .expected.as_ref().map(|e| format!("open element <{e}>")).unwrap_or_else(|| "any open element".to_string()))]
    StructuralInconsistency {
        expected: Option<String>,
        found: String,
    },

    /// A handler callback failed.
    #[error("Handler failed at {path}: {source}")]
    Handler {
        path: String,
        #[source]
        source: BoxError,
    },

    /// A path expression could not be compiled.
    #[error("Invalid path expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// A tokenizer property was not recognized or had an invalid value.
    #[error("Invalid XML property {key}={value}")]
    InvalidProperty { key: String, value: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl XPathStaxError {
    /// Build an `InvalidExpression` error.
    pub(crate) fn expression(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error originated in the tokenizer rather than in the core.
    #[must_use]
    pub fn is_tokenizer_error(&self) -> bool {
        matches!(self, Self::Tokenizer(_) | Self::UnexpectedEof { .. })
    }
}

/// Result type alias for xpathstax operations.
pub type Result<T> = std::result::Result<T, XPathStaxError>;
