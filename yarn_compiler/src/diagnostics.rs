//! User-facing compile diagnostics.
//!
//! Type and semantic problems are reported here rather than as errors, so one
//! compile can surface every independent problem. Each compilation job owns
//! its own [`Diagnostics`] list; nothing is collected globally.
//!
//! # Usage
//!
//! ```
//! use yarn_compiler::diagnostics::{Diagnostics, Severity};
//! use yarn_compiler_syntax::Span;
//!
//! let mut diagnostics = Diagnostics::new();
//! diagnostics.error("Intro.yarn", Span::at_line(3), "Redeclaration of existing variable $gold");
//! diagnostics.error("Intro.yarn", Span::at_line(3), "Redeclaration of existing variable $gold");
//! assert!(diagnostics.has_errors());
//! assert_eq!(diagnostics.into_deduplicated().len(), 1);
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use yarn_compiler_syntax::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Source file, when the problem can be attributed to one.
    pub file: Option<String>,
    pub span: Span,
    pub message: String,
    pub severity: Severity,
    /// Additional context (e.g. the node being compiled).
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            file: None,
            span: Span::empty(),
            message: message.into(),
            severity,
            context: None,
        }
    }

    pub fn error(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message).with_location(file, span)
    }

    pub fn warning(file: impl Into<String>, span: Span, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message).with_location(file, span)
    }

    pub fn with_location(mut self, file: impl Into<String>, span: Span) -> Self {
        self.file = Some(file.into());
        self.span = span;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) if self.span.is_known() => write!(
                f,
                "{}:{}:{}: ",
                file, self.span.start_line, self.span.start_column
            )?,
            Some(file) => write!(f, "{}: ", file)?,
            None => {}
        }
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " (in {})", ctx)?;
        }
        Ok(())
    }
}

/// Job-scoped diagnostic list.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, file: impl Into<String>, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(file, span, message));
    }

    pub fn warning(&mut self, file: impl Into<String>, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(file, span, message));
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(other);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Drop repeated diagnostics, keeping first occurrences in order.
    pub fn into_deduplicated(self) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        self.items
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect()
    }
}

/// Serialize diagnostics for tooling.
pub fn to_json(diagnostics: &[Diagnostic]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(diagnostics)
}
