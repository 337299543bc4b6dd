//! Error types for Timemap parsing
//!
//! Only the parse pipeline and Timemap lookups are fallible. URI
//! normalization never fails and has no error variant here.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::parser::tokenizer::Span;

/// Timemap error types
#[derive(Debug, Error)]
pub enum Error {
    /// Input text matching none of the Link-format token rules
    #[error("Lexical error: unrecognized input '{text}' at {span}")]
    Lexical { text: String, span: Span },

    /// Well-formed token that the link grammar does not accept here
    #[error("Unexpected timemap token '{token}' at {span}")]
    UnexpectedToken { token: String, span: Span },

    /// Instant attribute that no supported date/time format accepts
    #[error("Invalid datetime '{value}' at {span}")]
    InvalidDatetime { value: String, span: Span },

    /// Timemap has no mementos for the requested instant
    #[error("No mementos for {0}")]
    NotFound(DateTime<Utc>),

    /// Failure reading from the line source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors where the document violated the token grammar.
    pub fn is_lexical(&self) -> bool {
        matches!(
            self,
            Error::Lexical { .. } | Error::UnexpectedToken { .. } | Error::InvalidDatetime { .. }
        )
    }

    /// Source position of a lexical error.
    pub fn span(&self) -> Option<&Span> {
        match self {
            Error::Lexical { span, .. }
            | Error::UnexpectedToken { span, .. }
            | Error::InvalidDatetime { span, .. } => Some(span),
            Error::NotFound(_) | Error::Io(_) => None,
        }
    }
}

/// Result type alias for Timemap operations
pub type Result<T> = std::result::Result<T, Error>;
