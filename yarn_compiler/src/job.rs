//! Compilation inputs and outputs.

use indexmap::IndexMap;
use yarn_compiler_syntax::SourceFile;

use crate::cancel::CancellationToken;
use crate::config::CompilerConfig;
use crate::debug_info::NodeDebugInfo;
use crate::declaration::Declaration;
use crate::diagnostics::Diagnostic;
use crate::library::Library;
use crate::program::Program;
use crate::string_table::StringTable;
use crate::types::EnumType;

/// Newest script language version this compiler understands.
pub const LANGUAGE_VERSION: u32 = 3;

/// How far a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompilationType {
    /// Type check and generate a program.
    #[default]
    FullCompilation,
    /// Stop after type checking.
    TypeCheck,
    /// Stop after building the string table.
    StringsOnly,
}

/// Everything one compile needs.
#[derive(Debug, Clone)]
pub struct CompilationJob {
    pub files: Vec<SourceFile>,
    pub library: Library,
    /// Declarations the host already knows about (for example, variables
    /// saved from an earlier compile).
    pub declarations: Vec<Declaration>,
    /// Enums defined outside the scripts.
    pub type_declarations: Vec<EnumType>,
    pub compilation_type: CompilationType,
    pub language_version: u32,
    pub config: CompilerConfig,
    pub cancel: CancellationToken,
}

impl Default for CompilationJob {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            library: Library::standard(),
            declarations: Vec::new(),
            type_declarations: Vec::new(),
            compilation_type: CompilationType::default(),
            language_version: LANGUAGE_VERSION,
            config: CompilerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl CompilationJob {
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }

    pub fn with_library(mut self, library: Library) -> Self {
        self.library = library;
        self
    }

    pub fn with_declarations(mut self, declarations: Vec<Declaration>) -> Self {
        self.declarations = declarations;
        self
    }

    pub fn with_type_declarations(mut self, types: Vec<EnumType>) -> Self {
        self.type_declarations = types;
        self
    }

    pub fn with_compilation_type(mut self, compilation_type: CompilationType) -> Self {
        self.compilation_type = compilation_type;
        self
    }

    pub fn with_language_version(mut self, version: u32) -> Self {
        self.language_version = version;
        self
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// What a compile produced.
#[derive(Debug, Clone, Default)]
pub struct CompilationResult {
    /// `None` when the job stopped early or any error was reported.
    pub program: Option<Program>,
    pub string_table: StringTable,
    pub declarations: Vec<Declaration>,
    pub diagnostics: Vec<Diagnostic>,
    pub debug_info: IndexMap<String, NodeDebugInfo>,
    pub contains_implicit_string_tags: bool,
}

impl CompilationResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_job_uses_standard_library() {
        let job = CompilationJob::default();
        assert!(job.library.contains("Number.Add"));
        assert!(job.library.contains("visited"));
        assert_eq!(job.compilation_type, CompilationType::FullCompilation);
        assert_eq!(job.language_version, LANGUAGE_VERSION);
    }

    #[test]
    fn test_builders() {
        let job = CompilationJob::new(vec![])
            .with_compilation_type(CompilationType::TypeCheck)
            .with_library(Library::new())
            .with_language_version(2);
        assert_eq!(job.compilation_type, CompilationType::TypeCheck);
        assert!(job.library.is_empty());
        assert_eq!(job.language_version, 2);
    }
}
