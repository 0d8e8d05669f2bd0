//! Declaration collection.
//!
//! Runs before any constraints are generated for node bodies: first every
//! `enum` in the job is registered, then every `declare`, and only then are
//! the declared values typed. This lets a declaration's value mention names
//! declared later in the job.

use std::collections::HashSet;

use indexmap::IndexMap;
use yarn_compiler_syntax::{
    DeclareStatement, EnumDefinition, EnumRawValue, ExprKind, SourceFile, Span, Statement,
    StatementKind,
};

use super::constraint::{Constraint, FailureMessage};
use super::generate::ConstraintGenerator;
use super::TypeEnvironment;
use crate::cancel::CancellationToken;
use crate::declaration::Declaration;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::CResult;
use crate::types::{EnumMember, EnumType, Type, Value};

/// Visit `body` and every nested body, in source order.
fn for_each_statement<'a>(body: &'a [Statement], f: &mut dyn FnMut(&'a Statement)) {
    for statement in body {
        f(statement);
        for nested in statement.nested_bodies() {
            for_each_statement(nested, f);
        }
    }
}

struct PendingValue<'a> {
    file: &'a str,
    node: Option<&'a str>,
    statement: &'a DeclareStatement,
    span: Span,
}

/// Register enums and declarations; returns the declarations batch.
pub(super) fn collect_declarations(
    files: &[SourceFile],
    env: &mut TypeEnvironment,
    diagnostics: &mut Diagnostics,
    cancel: &CancellationToken,
) -> CResult<Vec<Constraint>> {
    for file in files {
        cancel.check()?;
        for node in &file.nodes {
            for_each_statement(&node.body, &mut |statement| {
                if let StatementKind::Enum(definition) = &statement.kind {
                    register_enum(&file.name, definition, env, diagnostics);
                }
            });
        }
    }

    let mut constraints = Vec::new();
    let mut pending = Vec::new();
    for file in files {
        cancel.check()?;
        for node in &file.nodes {
            let title = node.title();
            for_each_statement(&node.body, &mut |statement| {
                if let StatementKind::Declare(declare) = &statement.kind {
                    let registered = register_declaration(
                        &file.name,
                        title,
                        declare,
                        statement.span,
                        env,
                        diagnostics,
                    );
                    if let Some(link) = registered {
                        constraints.extend(link);
                        pending.push(PendingValue {
                            file: &file.name,
                            node: title,
                            statement: declare,
                            span: statement.span,
                        });
                    }
                }
            });
        }
    }

    report_reference_loops(env, diagnostics);

    for value in pending {
        cancel.check()?;
        let mut generator = ConstraintGenerator::new(env, diagnostics, value.file);
        generator.set_node(value.node);
        let value_ty = generator.infer(&value.statement.value);
        let declared_ty = generator
            .env()
            .declarations
            .get(&value.statement.variable)
            .map_or(Type::Error, |d| d.ty.clone());
        generator.equal(
            declared_ty,
            value_ty,
            value.span,
            FailureMessage::DeclaredType {
                variable: value.statement.variable.clone(),
            },
        );
        constraints.extend(generator.finish());
    }
    Ok(constraints)
}

/// Add one `declare`. Returns `None` when its value must not be typed, or
/// the optional constraint linking it to an earlier implicit declaration.
fn register_declaration(
    file: &str,
    node: Option<&str>,
    statement: &DeclareStatement,
    statement_span: Span,
    env: &mut TypeEnvironment,
    diagnostics: &mut Diagnostics,
) -> Option<Option<Constraint>> {
    let name = &statement.variable;
    let span = if statement.variable_span.is_known() {
        statement.variable_span
    } else {
        statement_span
    };

    let previous = env
        .declarations
        .get(name)
        .map(|d| (d.is_implicit, d.ty.clone()));
    if let Some((false, _)) = previous {
        diagnostics.error(file, span, format!("Redeclaration of existing variable {}", name));
        return None;
    }

    let ty = match &statement.type_name {
        Some(type_name) => match env.known.get(type_name) {
            Some(ty) => ty.clone(),
            None => {
                diagnostics.error(file, span, format!("Unknown type {}", type_name));
                Type::Error
            }
        },
        None => Type::Variable(env.supply.fresh(format!("T({name})"))),
    };

    let mut declaration =
        Declaration::variable(name.clone(), ty).with_source(file, node.map(str::to_string), span);
    declaration.description = statement.description.clone();
    declaration.initial_value_expression = Some(statement.value.clone());

    if statement.value.references_variable(name) {
        diagnostics.error(
            file,
            span,
            format!(
                "{}'s initial value refers to {} itself, so its type and default value can't be determined",
                name, name
            ),
        );
        declaration.ty = Type::Error;
        env.declarations.insert(declaration);
        return None;
    }

    declaration.is_inline_expansion = !statement.value.is_constant();
    let link = previous.map(|(_, implicit_ty)| {
        Constraint::equal(
            declaration.ty.clone(),
            implicit_ty,
            file,
            span,
            FailureMessage::ImplicitLink { name: name.clone() },
        )
    });
    env.declarations.insert(declaration);
    Some(link)
}

/// Smart variables read each other on every evaluation, so a cycle between
/// them never terminates. Every variable on a cycle is reported and typed
/// `Error`.
fn report_reference_loops(env: &mut TypeEnvironment, diagnostics: &mut Diagnostics) {
    let mut graph: IndexMap<String, Vec<String>> = IndexMap::new();
    for declaration in env.declarations.smart_variables() {
        let mut references = Vec::new();
        if let Some(expression) = &declaration.initial_value_expression {
            expression.walk(&mut |e| {
                if let ExprKind::Variable(name) = &e.kind {
                    if !references.contains(name) {
                        references.push(name.clone());
                    }
                }
            });
        }
        graph.insert(declaration.name.clone(), references);
    }

    let mut looped = Vec::new();
    for start in graph.keys() {
        let mut seen = HashSet::new();
        let mut stack: Vec<&String> = graph[start].iter().collect();
        while let Some(name) = stack.pop() {
            if name == start {
                looped.push(start.clone());
                break;
            }
            if seen.insert(name) {
                if let Some(next) = graph.get(name) {
                    stack.extend(next);
                }
            }
        }
    }

    for name in looped {
        let Some(declaration) = env.declarations.get_mut(&name) else {
            continue;
        };
        let mut diagnostic = Diagnostic::new(
            Severity::Error,
            format!(
                "Smart variables cannot contain reference loops (referencing {} here creates a loop for the smart variable {}).",
                name, name
            ),
        );
        if let Some(file) = &declaration.source_file {
            diagnostic = diagnostic.with_location(file.clone(), declaration.span);
        }
        diagnostics.push(diagnostic);
        declaration.ty = Type::Error;
    }
}

fn register_enum(
    file: &str,
    definition: &EnumDefinition,
    env: &mut TypeEnvironment,
    diagnostics: &mut Diagnostics,
) {
    let name = &definition.name;
    if env.known.contains(name) {
        diagnostics.error(
            file,
            definition.span,
            format!("Redeclaration of existing type {}", name),
        );
        return;
    }

    let has_string = definition
        .cases
        .iter()
        .any(|c| matches!(c.raw_value, Some(EnumRawValue::String(_))));
    let has_number = definition
        .cases
        .iter()
        .any(|c| matches!(c.raw_value, Some(EnumRawValue::Number(_))));
    if has_string && has_number {
        diagnostics.error(
            file,
            definition.span,
            format!("Enum {}'s cases must all have raw values of the same type", name),
        );
        return;
    }

    let mut members = IndexMap::new();
    let mut next_number = 0.0;
    for case in &definition.cases {
        if members.contains_key(&case.name) {
            diagnostics.error(
                file,
                case.span,
                format!("Enum {} already has a case named {}", name, case.name),
            );
            continue;
        }
        let raw_value = match &case.raw_value {
            Some(EnumRawValue::Number(n)) => {
                next_number = n + 1.0;
                Value::Number(*n)
            }
            Some(EnumRawValue::String(s)) => Value::String(s.clone()),
            None if has_string => Value::String(case.name.clone()),
            None => {
                let n = next_number;
                next_number += 1.0;
                Value::Number(n)
            }
        };
        if members.values().any(|m: &EnumMember| m.raw_value == raw_value) {
            diagnostics.error(
                file,
                case.span,
                format!("Enum {} has more than one case with the raw value {}", name, raw_value),
            );
            continue;
        }
        members.insert(
            case.name.clone(),
            EnumMember {
                name: case.name.clone(),
                raw_value,
                description: case.description.clone(),
            },
        );
    }

    env.known.add_enum(EnumType {
        name: name.clone(),
        raw_type: if has_string { Type::String } else { Type::Number },
        members,
        description: definition.description.clone(),
    });
}
