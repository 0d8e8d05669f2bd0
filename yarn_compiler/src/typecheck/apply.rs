//! Writing solved types back.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use yarn_compiler_syntax::{ExprId, ExprKind, Expression, UnaryOp};

use super::substitution::Substitution;
use super::TypeEnvironment;
use crate::cancel::CancellationToken;
use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::error::CResult;
use crate::types::{FunctionType, Type, TypeVar, Value};

/// The value of a constant expression, interpreted as `ty`.
pub fn constant_value(expr: &Expression, ty: &Type) -> Option<Value> {
    match (&expr.kind, ty) {
        (ExprKind::Number(n), _) => Some(Value::Number(*n)),
        (ExprKind::String(s), _) => Some(Value::String(s.clone())),
        (ExprKind::Bool(b), _) => Some(Value::Bool(*b)),
        (
            ExprKind::Unary {
                op: UnaryOp::Minus,
                operand,
            },
            _,
        ) => match operand.kind {
            ExprKind::Number(n) => Some(Value::Number(-n)),
            _ => None,
        },
        (ExprKind::EnumCase { case, .. }, Type::Enum(e)) => {
            e.member(case).map(|m| m.raw_value.clone())
        }
        _ => None,
    }
}

/// Replace the listed type variables with `Any`.
fn erase(ty: &Type, vars: &HashSet<TypeVar>) -> Type {
    match ty {
        Type::Variable(v) if vars.contains(v) => Type::Any,
        Type::Function(func) => Type::Function(Arc::new(FunctionType {
            parameters: func.parameters.iter().map(|p| erase(p, vars)).collect(),
            variadic: func.variadic.as_ref().map(|v| erase(v, vars)),
            return_type: erase(&func.return_type, vars),
        })),
        other => other.clone(),
    }
}

fn value_matches(value: &Value, ty: &Type) -> bool {
    match ty {
        Type::Enum(e) => e.members.values().any(|m| &m.raw_value == value),
        other => &value.type_of() == other,
    }
}

pub(super) fn apply_substitution(
    env: &mut TypeEnvironment,
    substitution: &Substitution,
    unresolved: &HashSet<TypeVar>,
    diagnostics: &mut Diagnostics,
    cancel: &CancellationToken,
) -> CResult<()> {
    let mut reported = unresolved.clone();

    // Parts of an inferred host-function signature that nothing pins down
    // accept anything.
    let mut erased = HashSet::new();
    for declaration in env.declarations.iter() {
        if declaration.is_implicit && declaration.is_function() {
            erased.extend(substitution.apply(&declaration.ty).free_variables());
        }
    }

    for declaration in env.declarations.iter_mut() {
        cancel.check()?;
        // Variables fed by such a signature are still undetermined.
        let mut ty = substitution.apply(&declaration.ty);
        if declaration.is_function() {
            ty = erase(&ty, &erased);
        }
        let free = ty.free_variables();
        if !free.is_empty() {
            reported.extend(free);
            let mut message = format!(
                "Can't determine type of {} given its usage. Manually specify its type with a declare statement.",
                declaration.name
            );
            if declaration.name.starts_with('$') {
                message.push_str(&format!(
                    " For example: <<declare {} = (initial value) >>",
                    declaration.name
                ));
            }
            let mut diagnostic = Diagnostic::new(Severity::Error, message);
            if let Some(file) = &declaration.source_file {
                diagnostic = diagnostic.with_location(file.clone(), declaration.span);
            }
            diagnostics.push(diagnostic);
            ty = Type::Error;
        }
        declaration.ty = ty;

        if declaration.ty == Type::Error {
            declaration.default_value = None;
            continue;
        }
        if declaration.is_function()
            || declaration.is_inline_expansion
            || declaration.default_value.is_some()
        {
            continue;
        }
        declaration.default_value = if declaration.is_implicit {
            env.implicit_defaults
                .get(&declaration.name)
                .and_then(|e| constant_value(e, &declaration.ty))
                .filter(|v| value_matches(v, &declaration.ty))
                .or_else(|| declaration.ty.default_value())
        } else {
            declaration
                .initial_value_expression
                .as_ref()
                .and_then(|e| constant_value(e, &declaration.ty))
        };
    }

    let mut ids: Vec<ExprId> = env.types.keys().copied().collect();
    ids.sort_unstable();
    for id in ids {
        let Some(ty) = env.types.get(&id) else {
            continue;
        };
        let ty = erase(&substitution.apply(ty), &erased);
        let free = ty.free_variables();
        let resolved = if free.is_empty() {
            ty
        } else {
            if !free.iter().any(|v| reported.contains(v)) {
                if let Some(site) = env.sites.get(&id) {
                    diagnostics.error(
                        site.file.clone(),
                        site.span,
                        "Can't determine the type of this expression.",
                    );
                }
            }
            reported.extend(free);
            Type::Error
        };
        env.types.insert(id, resolved);
    }

    for operator in &env.operators {
        let ty = erase(&substitution.apply(&operator.operand), &erased);
        // Any has no runtime implementation to dispatch to.
        let unsupported = ty == Type::Any || (ty != Type::Error && !ty.supports(operator.op));
        if ty.free_variables().is_empty() && unsupported {
            diagnostics.error(
                operator.file.clone(),
                operator.span,
                format!("Operator {} cannot be used with {} values", operator.symbol, ty),
            );
        }
    }

    debug!(
        declarations = env.declarations.len(),
        expressions = env.types.len(),
        "substitution applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Declaration;
    use crate::typecheck::ExprSite;
    use yarn_compiler_syntax::testing::*;
    use yarn_compiler_syntax::Span;

    #[test]
    fn test_constant_value() {
        assert_eq!(constant_value(&num(2.0), &Type::Number), Some(Value::Number(2.0)));
        assert_eq!(
            constant_value(&unary(UnaryOp::Minus, num(2.0)), &Type::Number),
            Some(Value::Number(-2.0))
        );
        assert_eq!(constant_value(&var("$x"), &Type::Number), None);
    }

    #[test]
    fn test_implicit_default_uses_first_constant() {
        let mut env = TypeEnvironment::default();
        let t = env.supply.fresh("T($y)");
        env.declarations
            .insert(Declaration::variable("$y", Type::Variable(t)).implicit());
        env.implicit_defaults.insert("$y".into(), num(1.0));
        let mut s = Substitution::new();
        s.bind(t, Type::Number);
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &s,
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        let y = env.declarations.get("$y").unwrap();
        assert_eq!(y.ty, Type::Number);
        assert_eq!(y.default_value, Some(Value::Number(1.0)));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_declaration_becomes_error() {
        let mut env = TypeEnvironment::default();
        let t = env.supply.fresh("T($z)");
        env.declarations.insert(
            Declaration::variable("$z", Type::Variable(t))
                .with_source("a.yarn", None, Span::at_line(2))
                .implicit(),
        );
        env.types.insert(7, Type::Variable(t));
        env.sites.insert(
            7,
            ExprSite {
                file: "a.yarn".into(),
                span: Span::at_line(2),
            },
        );
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &Substitution::new(),
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        let z = env.declarations.get("$z").unwrap();
        assert_eq!(z.ty, Type::Error);
        assert_eq!(z.default_value, None);
        // the expression shares the declaration's variable: one report only
        let messages: Vec<String> = diagnostics.iter().map(|d| d.message.clone()).collect();
        assert_eq!(
            messages,
            vec!["Can't determine type of $z given its usage. Manually specify its type with a declare statement. For example: <<declare $z = (initial value) >>"]
        );
        assert_eq!(env.types[&7], Type::Error);
    }

    #[test]
    fn test_implicit_function_signature_is_erased() {
        let mut env = TypeEnvironment::default();
        let p = env.supply.fresh("p");
        let r = env.supply.fresh("r");
        env.declarations.insert(
            Declaration::function(
                "play",
                FunctionType {
                    parameters: vec![Type::Variable(p)],
                    variadic: None,
                    return_type: Type::Variable(r),
                },
            )
            .implicit(),
        );
        env.types.insert(1, Type::Variable(r));
        let mut s = Substitution::new();
        s.bind(p, Type::String);
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &s,
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(
            env.declarations.get("play").unwrap().ty,
            Type::function(vec![Type::String], Type::Any)
        );
        assert_eq!(env.types[&1], Type::Any);
    }

    #[test]
    fn test_variable_fed_by_implicit_function_stays_undetermined() {
        let mut env = TypeEnvironment::default();
        let r = env.supply.fresh("r");
        let y = env.supply.fresh("T($y)");
        env.declarations.insert(
            Declaration::function(
                "foo",
                FunctionType {
                    parameters: vec![],
                    variadic: None,
                    return_type: Type::Variable(r),
                },
            )
            .implicit(),
        );
        env.declarations
            .insert(Declaration::variable("$y", Type::Variable(y)).implicit());
        let mut s = Substitution::new();
        s.bind(y, Type::Variable(r));
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &s,
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(env.declarations.get("foo").unwrap().ty, Type::function(vec![], Type::Any));
        assert_eq!(env.declarations.get("$y").unwrap().ty, Type::Error);
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn test_apply_twice_is_a_no_op() {
        let mut env = TypeEnvironment::default();
        let t = env.supply.fresh("T($n)");
        env.declarations
            .insert(Declaration::variable("$n", Type::Variable(t)).implicit());
        env.types.insert(0, Type::Variable(t));
        let mut s = Substitution::new();
        s.bind(t, Type::Bool);
        let mut diagnostics = Diagnostics::new();
        let cancel = CancellationToken::new();
        apply_substitution(&mut env, &s, &HashSet::new(), &mut diagnostics, &cancel).unwrap();
        let first: Vec<(String, Type)> =
            env.declarations.iter().map(|d| (d.name.clone(), d.ty.clone())).collect();
        apply_substitution(&mut env, &s, &HashSet::new(), &mut diagnostics, &cancel).unwrap();
        let second: Vec<(String, Type)> =
            env.declarations.iter().map(|d| (d.name.clone(), d.ty.clone())).collect();
        assert_eq!(first, second);
        assert_eq!(env.types[&0], Type::Bool);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_operator_on_any_reported() {
        let mut env = TypeEnvironment::default();
        env.operators.push(crate::typecheck::OperatorUse {
            op: crate::types::Operator::EqualTo,
            symbol: "==",
            operand: Type::Any,
            file: "a.yarn".into(),
            span: Span::at_line(1),
        });
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &Substitution::new(),
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Operator == cannot be used with Any values"
        );
    }

    #[test]
    fn test_unsupported_operator_reported() {
        let mut env = TypeEnvironment::default();
        env.operators.push(crate::typecheck::OperatorUse {
            op: crate::types::Operator::Add,
            symbol: "+",
            operand: Type::Bool,
            file: "a.yarn".into(),
            span: Span::at_line(1),
        });
        let mut diagnostics = Diagnostics::new();
        apply_substitution(
            &mut env,
            &Substitution::new(),
            &HashSet::new(),
            &mut diagnostics,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Operator + cannot be used with Bool values"
        );
    }
}
