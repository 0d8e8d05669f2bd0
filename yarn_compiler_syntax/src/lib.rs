//! yarn_compiler_syntax
//!
//! The parse-tree model for dialogue scripts, as produced by a front end and
//! consumed by `yarn_compiler`.
//!
//! Trees can be built programmatically or decoded from JSON:
//!
//! ```
//! use yarn_compiler_syntax::SourceFile;
//!
//! let json = r#"{
//!     "name": "Intro.yarn",
//!     "nodes": [{
//!         "headers": [{ "key": "title", "value": { "text": "Start" } }],
//!         "body": [{ "kind": "return" }]
//!     }]
//! }"#;
//! let file = SourceFile::from_json(json).unwrap();
//! assert_eq!(file.nodes[0].title(), Some("Start"));
//! ```

pub mod error;
pub mod span;
pub mod tree;

// Re-exports
pub use error::{SyntaxError, SyntaxResult};
pub use span::Span;
pub use tree::{
    compose_text, format_number, AssignOp, BinaryOp, Command, DeclareStatement, EnumCaseDefinition,
    EnumDefinition, EnumRawValue, ExprId, ExprKind, Expression, Header, HeaderValue, IfClause,
    JumpTarget, Line, Node, OnceBlock, SetStatement, ShortcutOption, SourceFile, Statement,
    StatementKind, TextPart, UnaryOp, WhenClause, TAGS_HEADER, TITLE_HEADER, TRACKING_HEADER,
    WHEN_HEADER,
};

// Test utilities (available in tests or with "testing" feature)
#[cfg(any(test, feature = "testing"))]
pub mod testing;
