//! Type equations and the messages reported when they can't hold.

use std::fmt;

use yarn_compiler_syntax::{format_number, Span};

use super::substitution::Substitution;
use crate::diagnostics::Diagnostic;
use crate::types::{Type, TypeVar};

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// Both sides must be the same type.
    Equal(Type, Type),
    /// `ty` must be an enum with a case named `member` (the `.Case`
    /// shorthand).
    HasMember { ty: Type, member: String },
}

/// Which sentence to report when a constraint fails.
///
/// Rendering receives the constraint's two sides with the substitution
/// applied; for [`ConstraintKind::HasMember`] both are the subject type.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureMessage {
    /// `set $v = e`: left is the variable, right the value.
    Assignment { variable: String },
    /// `declare $v = e as T`: left is `T`, right the value.
    DeclaredType { variable: String },
    /// A declaration replacing an earlier implicit one.
    ImplicitLink { name: String },
    /// Both operands of a binary operator.
    OperandsMatch { op: String },
    /// Left is the required operand type.
    Operand { op: String },
    /// Left is Bool, right the condition.
    Condition { context: String },
    /// Left is the parameter type, right the argument.
    Argument { function: String, index: usize },
    /// Left is String, right the destination expression.
    JumpDestination,
    EnumMember { case: String },
    Generic,
}

impl FailureMessage {
    pub fn render(&self, left: &Type, right: &Type) -> Vec<String> {
        let message = match self {
            FailureMessage::Assignment { variable } => {
                format!("{} ({}) cannot be assigned a {}", variable, left, right)
            }
            FailureMessage::DeclaredType { variable } => format!(
                "{} is declared as a {}, but its initial value is a {}",
                variable, left, right
            ),
            FailureMessage::ImplicitLink { name } => format!(
                "{} was declared to be a {}, but it was used elsewhere as a {}",
                name, left, right
            ),
            FailureMessage::OperandsMatch { op } => format!(
                "Operation '{}'s values must both be the same type, not {} and {}",
                op, left, right
            ),
            FailureMessage::Operand { op } => {
                format!("Operation '{}' requires a {} value, not a {}", op, left, right)
            }
            FailureMessage::Condition { context } => {
                format!("{}'s expression must be a {}, not a {}", context, left, right)
            }
            FailureMessage::Argument { function, index } => format!(
                "{} parameter {} expects a {}, not a {}",
                function,
                index + 1,
                left,
                right
            ),
            FailureMessage::JumpDestination => {
                format!("Jump destination must be a {}, not a {}", left, right)
            }
            FailureMessage::EnumMember { case } => match left {
                Type::Variable(_) => format!(
                    "Can't determine which enum the case .{} belongs to. Write it with the enum's name, like EnumName.{}",
                    case, case
                ),
                Type::Enum(e) => format!("{} doesn't have a case named {}", e.name, case),
                other => format!(".{} is an enum case, but a {} is expected here", case, other),
            },
            FailureMessage::Generic => format!("{} is not compatible with {}", left, right),
        };
        vec![message]
    }
}

/// One type equation, with where it came from.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub file: String,
    pub span: Span,
    pub message: FailureMessage,
}

impl Constraint {
    pub fn equal(
        left: Type,
        right: Type,
        file: impl Into<String>,
        span: Span,
        message: FailureMessage,
    ) -> Self {
        Self {
            kind: ConstraintKind::Equal(left, right),
            file: file.into(),
            span,
            message,
        }
    }

    pub fn has_member(
        ty: Type,
        member: impl Into<String>,
        file: impl Into<String>,
        span: Span,
    ) -> Self {
        let member = member.into();
        Self {
            message: FailureMessage::EnumMember {
                case: member.clone(),
            },
            kind: ConstraintKind::HasMember { ty, member },
            file: file.into(),
            span,
        }
    }

    pub fn variables(&self) -> Vec<TypeVar> {
        match &self.kind {
            ConstraintKind::Equal(left, right) => {
                let mut vars = left.free_variables();
                for v in right.free_variables() {
                    if !vars.contains(&v) {
                        vars.push(v);
                    }
                }
                vars
            }
            ConstraintKind::HasMember { ty, .. } => ty.free_variables(),
        }
    }

    pub fn mentions_any(&self, vars: &[TypeVar]) -> bool {
        self.variables().iter().any(|v| vars.contains(v))
    }

    /// The constraint with the substitution applied to both sides.
    pub fn apply(&self, substitution: &Substitution) -> Constraint {
        let kind = match &self.kind {
            ConstraintKind::Equal(left, right) => {
                ConstraintKind::Equal(substitution.apply(left), substitution.apply(right))
            }
            ConstraintKind::HasMember { ty, member } => ConstraintKind::HasMember {
                ty: substitution.apply(ty),
                member: member.clone(),
            },
        };
        Constraint {
            kind,
            ..self.clone()
        }
    }

    /// Already satisfied, so solving it would change nothing.
    pub fn is_tautology(&self) -> bool {
        match &self.kind {
            ConstraintKind::Equal(left, right) => {
                left == right || left.is_wildcard() || right.is_wildcard()
            }
            ConstraintKind::HasMember { ty, member } => match ty {
                Type::Enum(e) => e.member(member).is_some(),
                other => other.is_wildcard(),
            },
        }
    }

    /// Error diagnostics describing why this constraint can't hold under
    /// `substitution`.
    pub fn failure_diagnostics(&self, substitution: &Substitution) -> Vec<Diagnostic> {
        let (left, right) = match &self.kind {
            ConstraintKind::Equal(left, right) => {
                (substitution.apply(left), substitution.apply(right))
            }
            ConstraintKind::HasMember { ty, .. } => {
                let ty = substitution.apply(ty);
                (ty.clone(), ty)
            }
        };
        self.message
            .render(&left, &right)
            .into_iter()
            .map(|m| Diagnostic::error(self.file.clone(), self.span, m))
            .collect()
    }

    /// Diagnostic for a constraint abandoned by the solver's time limit.
    pub fn timeout_diagnostic(&self, limit_secs: f64) -> Diagnostic {
        Diagnostic::error(
            self.file.clone(),
            self.span,
            format!(
                "Expression failed to resolve in a reasonable time ({}). Try simplifying this expression.",
                format_number(limit_secs)
            ),
        )
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConstraintKind::Equal(left, right) => write!(f, "{} == {}", left, right)?,
            ConstraintKind::HasMember { ty, member } => write!(f, "{} has .{}", ty, member)?,
        }
        write!(f, " ({}:{})", self.file, self.span.start_line)
    }
}
