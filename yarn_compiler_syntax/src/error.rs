//! Errors for malformed syntax trees

use crate::span::Span;
use thiserror::Error;

/// Error raised when a tree handed over by the front end is unusable
#[derive(Error, Debug)]
pub enum SyntaxError {
    /// The JSON document could not be decoded into a tree
    #[error("invalid syntax tree: {0}")]
    Json(#[from] serde_json::Error),

    #[error("source file has an empty name")]
    EmptyFileName,

    /// A node with no headers at all (not even a title)
    #[error("node at {span:?} has no headers")]
    NodeWithoutHeaders { span: Span },

    #[error("option group at {span:?} has no options")]
    EmptyOptionGroup { span: Span },

    /// An `if` statement whose first clause is missing or has no condition
    #[error("if statement at {span:?} has no leading condition")]
    EmptyIf { span: Span },

    /// An `else` clause followed by further clauses
    #[error("else clause at {span:?} must be the last clause")]
    MisplacedElse { span: Span },

    #[error("enum '{name}' at {span:?} has no cases")]
    EmptyEnum { name: String, span: Span },
}

impl SyntaxError {
    /// Get the span of the error
    pub fn span(&self) -> Option<&Span> {
        match self {
            SyntaxError::Json(_) | SyntaxError::EmptyFileName => None,
            SyntaxError::NodeWithoutHeaders { span } => Some(span),
            SyntaxError::EmptyOptionGroup { span } => Some(span),
            SyntaxError::EmptyIf { span } => Some(span),
            SyntaxError::MisplacedElse { span } => Some(span),
            SyntaxError::EmptyEnum { span, .. } => Some(span),
        }
    }
}

/// Result type for tree loading
pub type SyntaxResult<T> = Result<T, SyntaxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_name() {
        let err = SyntaxError::EmptyEnum {
            name: "Mood".into(),
            span: Span::at_line(3),
        };
        assert!(err.to_string().contains("'Mood'"));
        assert_eq!(err.span().map(|s| s.start_line), Some(3));
    }

    #[test]
    fn test_json_error_has_no_span() {
        let err: SyntaxError = serde_json::from_str::<serde_json::Value>("{")
            .map_err(SyntaxError::from)
            .unwrap_err();
        assert!(err.span().is_none());
        assert!(err.to_string().starts_with("invalid syntax tree"));
    }
}
