//! yarn_compiler
//!
//! Type checking and bytecode generation for dialogue scripts. Takes parse
//! trees from `yarn_compiler_syntax` and produces a [`Program`], its string
//! table, declarations and diagnostics.
//!
//! ```
//! use yarn_compiler::{compile, CompilationJob, SourceFile};
//!
//! let json = r#"{
//!     "name": "Intro.yarn",
//!     "nodes": [{
//!         "headers": [{ "key": "title", "value": { "text": "Start" } }],
//!         "body": [{ "kind": "return" }]
//!     }]
//! }"#;
//! let file = SourceFile::from_json(json).unwrap();
//! let result = compile(CompilationJob::new(vec![file])).unwrap();
//! assert!(result.program.unwrap().node("Start").is_some());
//! ```

// Library code reports through diagnostics and tracing, never stderr.
#![deny(clippy::print_stderr)]

// Core modules
pub mod cancel;
pub mod config;
pub mod declaration;
pub mod diagnostics;
pub mod error;
pub mod library;
pub mod types;

// Passes
pub mod codegen;
pub mod compile;
pub mod string_table;
pub mod typecheck;
pub mod validate;

// Inputs and outputs
pub mod debug_info;
pub mod job;
pub mod program;

// Program file format
pub mod bytecode;

pub use cancel::CancellationToken;
pub use compile::compile;
pub use config::CompilerConfig;
pub use declaration::{Declaration, DeclarationTable};
pub use diagnostics::{Diagnostic, Severity};
pub use error::{CResult, CompileError};
pub use job::{CompilationJob, CompilationResult, CompilationType, LANGUAGE_VERSION};
pub use library::Library;
pub use program::{Instruction, Node, OpCode, Program};
pub use string_table::{StringInfo, StringTable};
pub use types::{Type, Value};
pub use yarn_compiler_syntax::SourceFile;

/// Prefix shared by every variable the compiler declares on its own.
pub const INTERNAL_VARIABLE_PREFIX: &str = "$Yarn.Internal.";

/// Tag carried by nodes that compute a value instead of running content.
pub const SMART_VARIABLE_TAG: &str = "Yarn.SmartVariable";

/// Header on a group member naming its group.
pub const NODE_GROUP_HEADER: &str = "$Yarn.Internal.NodeGroup";

/// Header on a hub node naming the group it selects from.
pub const NODE_GROUP_HUB_HEADER: &str = "$Yarn.Internal.NodeGroupHub";

/// Header naming the visit counter a node updates on exit.
pub const TRACKING_VARIABLE_HEADER: &str = "$Yarn.Internal.TrackingVariable";

/// `;`-separated condition variables of a group member.
pub const SALIENCY_VARIABLES_HEADER: &str = "$Yarn.Internal.ContentSaliencyVariables";

pub const SALIENCY_COMPLEXITY_HEADER: &str = "$Yarn.Internal.ContentSaliencyComplexity";

/// Visit counter variable for `node`.
pub fn tracking_variable_name(node: &str) -> String {
    format!("{}Visiting.{}", INTERNAL_VARIABLE_PREFIX, node)
}

/// Variable recording whether the `once` block or group member `id` has run.
pub fn once_variable_name(id: &str) -> String {
    format!("{}Once.{}", INTERNAL_VARIABLE_PREFIX, id)
}
