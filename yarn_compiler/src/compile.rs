//! The compile driver.
//!
//! Phases, in order:
//! 1. number expressions, validate nodes and find node groups
//! 2. register strings (`StringsOnly` stops here)
//! 3. collect declarations and type check (`TypeCheck` stops here)
//! 4. generate code for nodes, smart variables and node groups
//! 5. build the initial-value table
//!
//! Code generation is skipped entirely once any error has been reported.

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};
use yarn_compiler_syntax::{SourceFile, Statement, StatementKind, TRACKING_HEADER};

use crate::codegen::{compile_file, compile_group, compile_smart_variable};
use crate::declaration::{Declaration, DeclarationTable};
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::CResult;
use crate::job::{CompilationJob, CompilationResult, CompilationType, LANGUAGE_VERSION};
use crate::program::Program;
use crate::string_table::register_strings;
use crate::typecheck::{self, TypeEnvironment};
use crate::types::{KnownTypes, Type, Value};
use crate::validate::validate_nodes;

fn assign_once_ids_in(
    body: &mut [Statement],
    prefix: &str,
    counter: &mut usize,
    found: &mut Vec<(String, yarn_compiler_syntax::Span)>,
) {
    for statement in body {
        let span = statement.span;
        match &mut statement.kind {
            StatementKind::Once(block) => {
                let id = block.id.get_or_insert_with(|| {
                    let id = format!("{}-{}", prefix, counter);
                    *counter += 1;
                    id
                });
                found.push((id.clone(), span));
                assign_once_ids_in(&mut block.body, prefix, counter, found);
                assign_once_ids_in(&mut block.else_body, prefix, counter, found);
            }
            StatementKind::Options(options) => {
                for option in options {
                    assign_once_ids_in(&mut option.body, prefix, counter, found);
                }
            }
            StatementKind::If(clauses) => {
                for clause in clauses {
                    assign_once_ids_in(&mut clause.body, prefix, counter, found);
                }
            }
            _ => {}
        }
    }
}

/// Give every `once` block an ID and declare its variable.
fn declare_once_variables(files: &mut [SourceFile], declarations: &mut DeclarationTable) {
    for file in files.iter_mut() {
        let stem = file.stem().to_string();
        for node in &mut file.nodes {
            let title = node.title().map(str::to_string);
            let prefix = format!("{}-{}", stem, title.as_deref().unwrap_or(""));
            let mut counter = 0;
            let mut found = Vec::new();
            assign_once_ids_in(&mut node.body, &prefix, &mut counter, &mut found);
            for (id, span) in found {
                declarations.insert(
                    Declaration::variable(crate::once_variable_name(&id), Type::Bool)
                        .with_default(Value::Bool(false))
                        .with_source(file.name.clone(), title.clone(), span)
                        .with_description("Whether this once statement has run"),
                );
            }
        }
    }
}

/// Declare a visit counter for every node that needs one.
fn declare_tracking_variables(
    files: &[SourceFile],
    env: &mut TypeEnvironment,
    track_all_nodes: bool,
) {
    let mut tracked = IndexMap::new();
    for file in files {
        for node in &file.nodes {
            let Some(title) = node.title() else {
                continue;
            };
            let wanted = match node.header_text(TRACKING_HEADER).map(str::trim) {
                Some("never") => false,
                Some("always") => true,
                _ => track_all_nodes || env.tracked_nodes.contains(title),
            };
            if wanted {
                tracked
                    .entry(title.to_string())
                    .or_insert_with(|| (file.name.clone(), node.title_span()));
            }
        }
    }
    for (title, (file, span)) in tracked {
        env.declarations.insert(
            Declaration::variable(crate::tracking_variable_name(&title), Type::Number)
                .with_default(Value::Number(0.0))
                .with_source(file, Some(title.clone()), span)
                .with_description(format!("The number of times {} has been visited", title)),
        );
    }
}

/// Compile a job.
///
/// Problems in the scripts are returned as diagnostics; `Err` means the job
/// was cancelled or hit an internal error.
#[instrument(skip_all, fields(files = job.files.len(), kind = ?job.compilation_type))]
pub fn compile(job: CompilationJob) -> CResult<CompilationResult> {
    let CompilationJob {
        mut files,
        library,
        declarations,
        type_declarations,
        compilation_type,
        language_version,
        config,
        cancel,
    } = job;

    let mut diagnostics = Diagnostics::new();
    if language_version > LANGUAGE_VERSION {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            format!(
                "Language version {} is not supported (newest supported version is {})",
                language_version, LANGUAGE_VERSION
            ),
        ));
    }

    let mut next_id = 0;
    for file in files.iter_mut() {
        cancel.check()?;
        next_id = file.number_expressions(next_id);
    }

    let groups = validate_nodes(&mut files, &mut diagnostics);
    let (string_table, contains_implicit_string_tags) =
        register_strings(&mut files, &mut diagnostics);
    let mut result = CompilationResult {
        string_table,
        contains_implicit_string_tags,
        ..CompilationResult::default()
    };
    if compilation_type == CompilationType::StringsOnly {
        result.diagnostics = diagnostics.into_deduplicated();
        return Ok(result);
    }

    let mut table = DeclarationTable::new();
    let (library_declarations, library_diagnostics) = library.declarations();
    diagnostics.extend(library_diagnostics);
    for declaration in library_declarations.into_iter().chain(declarations) {
        table.insert(declaration);
    }
    declare_once_variables(&mut files, &mut table);

    let mut known = KnownTypes::default();
    for enum_type in type_declarations {
        let name = enum_type.name.clone();
        if !known.add_enum(enum_type) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                format!("Type {} is already defined", name),
            ));
        }
    }

    let mut env = TypeEnvironment::new(table, known);
    typecheck::check(&files, &mut env, &config, &cancel, &mut diagnostics)?;
    declare_tracking_variables(&files, &mut env, config.track_all_nodes);

    if compilation_type == CompilationType::TypeCheck || diagnostics.has_errors() {
        if diagnostics.has_errors() {
            debug!(errors = diagnostics.error_count(), "code generation skipped");
        }
        result.declarations = env.declarations.into_vec();
        result.diagnostics = diagnostics.into_deduplicated();
        return Ok(result);
    }

    let mut program = Program::new();
    for file in &files {
        for (node, debug_info) in compile_file(file, &env, &cancel)? {
            result.debug_info.insert(node.name.clone(), debug_info);
            program.add_node(node);
        }
    }
    for declaration in env.declarations.smart_variables() {
        cancel.check()?;
        let (node, debug_info) = compile_smart_variable(declaration, &env)?;
        result.debug_info.insert(node.name.clone(), debug_info);
        program.add_node(node);
    }
    let mut group_declarations = Vec::new();
    for group in &groups {
        cancel.check()?;
        let members: Vec<_> = group
            .members
            .iter()
            .map(|&(f, n)| &files[f].nodes[n])
            .collect();
        let output = compile_group(&group.name, &group.file, &members, &mut program.nodes, &env)?;
        for (node, debug_info) in output.nodes {
            result.debug_info.insert(node.name.clone(), debug_info);
            program.add_node(node);
        }
        group_declarations.extend(output.declarations);
    }
    for declaration in group_declarations {
        env.declarations.insert(declaration);
    }

    for declaration in env.declarations.iter() {
        if declaration.is_function() || declaration.is_inline_expansion {
            continue;
        }
        match &declaration.default_value {
            Some(value) => {
                program
                    .initial_values
                    .insert(declaration.name.clone(), value.clone());
            }
            None => {
                let mut diagnostic = Diagnostic::new(
                    Severity::Error,
                    format!(
                        "Variable declaration {} (type {}) has a null default value. This is not allowed.",
                        declaration.name, declaration.ty
                    ),
                );
                if let Some(file) = &declaration.source_file {
                    diagnostic = diagnostic.with_location(file.clone(), declaration.span);
                }
                diagnostics.push(diagnostic);
            }
        }
    }

    if diagnostics.has_errors() {
        warn!("initial values incomplete; program discarded");
    } else {
        debug!(
            nodes = program.nodes.len(),
            initial_values = program.initial_values.len(),
            "program generated"
        );
        result.program = Some(program);
    }
    result.declarations = env.declarations.into_vec();
    result.diagnostics = diagnostics.into_deduplicated();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yarn_compiler_syntax::testing::*;

    #[test]
    fn test_once_ids_assigned_in_order() {
        let mut files = vec![file(
            "Intro.yarn",
            vec![node(
                "Start",
                vec![
                    once(None, vec![once(None, vec![], vec![])], vec![]),
                    once(None, vec![], vec![]),
                ],
            )],
        )];
        let mut table = DeclarationTable::new();
        declare_once_variables(&mut files, &mut table);
        let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "$Yarn.Internal.Once.Intro-Start-0",
                "$Yarn.Internal.Once.Intro-Start-1",
                "$Yarn.Internal.Once.Intro-Start-2",
            ]
        );
        assert_eq!(
            table.get("$Yarn.Internal.Once.Intro-Start-0").unwrap().default_value,
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn test_tracking_header_overrides() {
        use yarn_compiler_syntax::Header;
        let files = vec![file(
            "a.yarn",
            vec![
                node_with_headers("A", vec![Header::text("tracking", "always")], vec![]),
                node_with_headers("B", vec![Header::text("tracking", "never")], vec![]),
                node("C", vec![]),
            ],
        )];
        let mut env = TypeEnvironment::default();
        env.tracked_nodes.insert("B".into());
        declare_tracking_variables(&files, &mut env, false);
        assert!(env.declarations.contains("$Yarn.Internal.Visiting.A"));
        assert!(!env.declarations.contains("$Yarn.Internal.Visiting.B"));
        assert!(!env.declarations.contains("$Yarn.Internal.Visiting.C"));

        let mut env = TypeEnvironment::default();
        declare_tracking_variables(&files, &mut env, true);
        assert!(env.declarations.contains("$Yarn.Internal.Visiting.C"));
        assert!(!env.declarations.contains("$Yarn.Internal.Visiting.B"));
    }

    #[test]
    fn test_strings_only_stops_early() {
        let job = CompilationJob::new(vec![file(
            "a.yarn",
            vec![node("Start", vec![untagged_line("Hi"), set("$x", num(1.0))])],
        )])
        .with_compilation_type(CompilationType::StringsOnly);
        let result = compile(job).unwrap();
        assert!(result.program.is_none());
        assert!(result.declarations.is_empty());
        assert!(result.contains_implicit_string_tags);
        assert_eq!(result.string_table.len(), 1);
    }

    #[test]
    fn test_newer_language_version_rejected() {
        let job = CompilationJob::new(vec![file(
            "a.yarn",
            vec![node("Start", vec![line("Hi", "hi")])],
        )])
        .with_language_version(LANGUAGE_VERSION + 1);
        let result = compile(job).unwrap();
        assert!(result.has_errors());
        assert!(result.program.is_none());
    }
}
