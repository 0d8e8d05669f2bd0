//! Constraint generation.
//!
//! Walks node bodies and records one or more type equations per usage site.
//! Names used without a declaration get an implicit one, typed by a fresh
//! type variable that the solver later resolves.

use std::sync::Arc;

use yarn_compiler_syntax::{
    BinaryOp, ExprKind, Expression, JumpTarget, Line, SetStatement, SourceFile, Span, Statement,
    StatementKind, UnaryOp,
};

use super::constraint::{Constraint, FailureMessage};
use super::{ExprSite, OperatorUse, TypeEnvironment};
use crate::declaration::Declaration;
use crate::diagnostics::Diagnostics;
use crate::types::{FunctionType, Operator, Type};

/// Names of the functions whose string argument marks a node as tracked.
const VISIT_FUNCTIONS: [&str; 2] = ["visited", "visited_count"];

pub(super) struct ConstraintGenerator<'a> {
    env: &'a mut TypeEnvironment,
    diagnostics: &'a mut Diagnostics,
    file: String,
    node: Option<String>,
    constraints: Vec<Constraint>,
}

impl<'a> ConstraintGenerator<'a> {
    pub(super) fn new(
        env: &'a mut TypeEnvironment,
        diagnostics: &'a mut Diagnostics,
        file: &str,
    ) -> Self {
        Self {
            env,
            diagnostics,
            file: file.to_string(),
            node: None,
            constraints: Vec::new(),
        }
    }

    pub(super) fn set_node(&mut self, node: Option<&str>) {
        self.node = node.map(str::to_string);
    }

    pub(super) fn env(&mut self) -> &mut TypeEnvironment {
        &mut *self.env
    }

    pub(super) fn finish(self) -> Vec<Constraint> {
        self.constraints
    }

    pub(super) fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diagnostics.error(self.file.clone(), span, message);
    }

    pub(super) fn equal(&mut self, left: Type, right: Type, span: Span, message: FailureMessage) {
        self.constraints
            .push(Constraint::equal(left, right, self.file.clone(), span, message));
    }

    pub(super) fn body(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Line(line) => self.line(line),
            StatementKind::Options(options) => {
                for option in options {
                    self.line(&option.line);
                    if let Some(condition) = &option.condition {
                        self.condition(condition, "line condition");
                    }
                    self.body(&option.body);
                }
            }
            StatementKind::If(clauses) => {
                for clause in clauses {
                    if let Some(condition) = &clause.condition {
                        self.condition(condition, "if statement");
                    }
                    self.body(&clause.body);
                }
            }
            StatementKind::Once(block) => {
                if let Some(condition) = &block.condition {
                    self.condition(condition, "once statement");
                }
                self.body(&block.body);
                self.body(&block.else_body);
            }
            StatementKind::Set(set) => self.set_statement(set, statement.span),
            StatementKind::Call(expr) => {
                self.infer(expr);
            }
            StatementKind::Command(command) => {
                for expr in command.substitutions() {
                    self.infer(expr);
                }
            }
            StatementKind::Jump(target) | StatementKind::Detour(target) => {
                if let JumpTarget::Expression(expr) = target {
                    let ty = self.infer(expr);
                    self.equal(Type::String, ty, expr.span, FailureMessage::JumpDestination);
                }
            }
            // Declarations and enums are handled by the collector.
            StatementKind::Declare(_) | StatementKind::Enum(_) | StatementKind::Return => {}
        }
    }

    fn line(&mut self, line: &Line) {
        for expr in line.substitutions() {
            self.infer(expr);
        }
    }

    pub(super) fn condition(&mut self, expr: &Expression, context: &str) {
        let ty = self.infer(expr);
        self.equal(
            Type::Bool,
            ty,
            expr.span,
            FailureMessage::Condition {
                context: context.to_string(),
            },
        );
    }

    fn set_statement(&mut self, set: &SetStatement, span: Span) {
        let value_ty = self.infer(&set.value);

        if let Some(declaration) = self.env.declarations.get(&set.variable) {
            if declaration.is_inline_expansion {
                let expression = declaration
                    .initial_value_expression
                    .as_ref()
                    .map(Expression::source_text)
                    .unwrap_or_default();
                let message = format!(
                    "{} cannot be modified (it's a smart variable and is always equal to {})",
                    set.variable, expression
                );
                self.error(span, message);
                return;
            }
        }

        let variable_span = if set.variable_span.is_known() {
            set.variable_span
        } else {
            span
        };
        let variable_ty = self.variable_type(&set.variable, variable_span);
        let assigned = match set.op.binary_op() {
            Some(op) => self.binary(op, variable_ty.clone(), value_ty, span),
            None => value_ty,
        };

        let implicit = self
            .env
            .declarations
            .get(&set.variable)
            .is_some_and(|d| d.is_implicit);
        if implicit && set.op.binary_op().is_none() && set.value.is_constant() {
            self.env
                .implicit_defaults
                .entry(set.variable.clone())
                .or_insert_with(|| set.value.clone());
        }

        self.equal(
            variable_ty,
            assigned,
            span,
            FailureMessage::Assignment {
                variable: set.variable.clone(),
            },
        );
    }

    /// Record and return the type of `expr` and all of its sub-expressions.
    pub(super) fn infer(&mut self, expr: &Expression) -> Type {
        let ty = match &expr.kind {
            ExprKind::Number(_) => Type::Number,
            ExprKind::String(_) => Type::String,
            ExprKind::Bool(_) => Type::Bool,
            ExprKind::Null => {
                self.error(
                    expr.span,
                    "Null is not a permitted type in Yarn Spinner 2.0 and later",
                );
                Type::Error
            }
            ExprKind::Variable(name) => self.variable_type(name, expr.span),
            ExprKind::Call {
                function,
                arguments,
            } => self.call(function, arguments, expr.span),
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.infer(operand);
                let required = match op {
                    UnaryOp::Not => Type::Bool,
                    UnaryOp::Minus => Type::Number,
                };
                self.equal(
                    required.clone(),
                    operand_ty,
                    expr.span,
                    FailureMessage::Operand {
                        op: op.symbol().to_string(),
                    },
                );
                required
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.infer(left);
                let right_ty = self.infer(right);
                self.binary(*op, left_ty, right_ty, expr.span)
            }
            ExprKind::EnumCase { enum_name, case } => {
                self.enum_case(enum_name.as_deref(), case, expr.span)
            }
        };
        self.env.types.insert(expr.id, ty.clone());
        self.env.sites.insert(
            expr.id,
            ExprSite {
                file: self.file.clone(),
                span: expr.span,
            },
        );
        ty
    }

    fn binary(&mut self, op: BinaryOp, left: Type, right: Type, span: Span) -> Type {
        let symbol = op.symbol();
        let operand = || FailureMessage::Operand {
            op: symbol.to_string(),
        };
        if op.is_logical() {
            self.equal(Type::Bool, left, span, operand());
            self.equal(Type::Bool, right, span, operand());
            return Type::Bool;
        }

        self.equal(
            left.clone(),
            right,
            span,
            FailureMessage::OperandsMatch {
                op: symbol.to_string(),
            },
        );
        if op.is_comparison() || (op.is_arithmetic() && op != BinaryOp::Add) {
            self.equal(Type::Number, left.clone(), span, operand());
        }
        // Addition and equality depend on the operand type, which is only
        // known after solving.
        if matches!(op, BinaryOp::Add | BinaryOp::Eq | BinaryOp::Ne) {
            self.env.operators.push(OperatorUse {
                op: Operator::from_binary(op),
                symbol,
                operand: left.clone(),
                file: self.file.clone(),
                span,
            });
        }

        if op.is_arithmetic() {
            left
        } else {
            Type::Bool
        }
    }

    fn variable_type(&mut self, name: &str, span: Span) -> Type {
        if let Some(declaration) = self.env.declarations.get(name) {
            return declaration.ty.clone();
        }
        let var = Type::Variable(self.env.supply.fresh(format!("T({name})")));
        let declaration = Declaration::variable(name, var.clone())
            .with_source(self.file.clone(), self.node.clone(), span)
            .implicit();
        self.env.declarations.insert(declaration);
        var
    }

    fn call(&mut self, function: &str, arguments: &[Expression], span: Span) -> Type {
        let argument_types: Vec<Type> = arguments.iter().map(|a| self.infer(a)).collect();
        let count = argument_types.len();

        if VISIT_FUNCTIONS.contains(&function) {
            if let Some(ExprKind::String(node)) = arguments.first().map(|a| &a.kind) {
                self.env.tracked_nodes.insert(node.clone());
            }
        }

        let existing = self
            .env
            .declarations
            .get(function)
            .map(|d| (d.ty.clone(), d.is_implicit));
        let signature = match existing {
            Some((Type::Function(signature), implicit)) => {
                if !signature.accepts_arity(count) {
                    let expected = signature.parameters.len();
                    let message = if implicit {
                        format!(
                            "{} was called elsewhere with {} {}, but is called with {} {} here",
                            function,
                            expected,
                            parameters(expected),
                            count,
                            parameters(count)
                        )
                    } else if signature.variadic.is_some() {
                        format!(
                            "{} expects at least {} {}, not {}",
                            function,
                            expected,
                            parameters(expected),
                            count
                        )
                    } else {
                        format!(
                            "{} expects {} {}, not {}",
                            function,
                            expected,
                            parameters(expected),
                            count
                        )
                    };
                    self.error(span, message);
                    return signature.return_type.clone();
                }
                signature
            }
            Some((Type::Error, _)) => return Type::Error,
            Some(_) => {
                self.error(
                    span,
                    format!("{} cannot be called, because it isn't a function", function),
                );
                return Type::Error;
            }
            None => {
                let parameters = (0..count)
                    .map(|i| Type::Variable(self.env.supply.fresh(format!("T({function} #{i})"))))
                    .collect();
                let hint = format!("T({function} result)");
                let return_type = Type::Variable(self.env.supply.fresh(hint));
                let signature = FunctionType {
                    parameters,
                    variadic: None,
                    return_type,
                };
                let declaration = Declaration::function(function, signature.clone())
                    .with_source(self.file.clone(), self.node.clone(), span)
                    .implicit();
                self.env.declarations.insert(declaration);
                Arc::new(signature)
            }
        };

        for (index, (argument, ty)) in arguments.iter().zip(argument_types).enumerate() {
            if let Some(parameter) = signature.parameter(index) {
                self.equal(
                    parameter.clone(),
                    ty,
                    argument.span,
                    FailureMessage::Argument {
                        function: function.to_string(),
                        index,
                    },
                );
            }
        }
        signature.return_type.clone()
    }

    fn enum_case(&mut self, enum_name: Option<&str>, case: &str, span: Span) -> Type {
        let Some(name) = enum_name else {
            let var = Type::Variable(self.env.supply.fresh(format!("T(.{case})")));
            self.constraints.push(Constraint::has_member(
                var.clone(),
                case,
                self.file.clone(),
                span,
            ));
            return var;
        };
        match self.env.known.get(name).cloned() {
            Some(Type::Enum(e)) if e.member(case).is_some() => Type::Enum(e),
            Some(Type::Enum(_)) => {
                self.error(span, format!("{} doesn't have a case named {}", name, case));
                Type::Error
            }
            _ => {
                self.error(span, format!("Unknown enum {}", name));
                Type::Error
            }
        }
    }
}

fn parameters(count: usize) -> &'static str {
    if count == 1 {
        "parameter"
    } else {
        "parameters"
    }
}

/// Constraints for every node body in `file`.
pub(super) fn generate_file(
    file: &SourceFile,
    env: &mut TypeEnvironment,
    diagnostics: &mut Diagnostics,
) -> Vec<Constraint> {
    let mut generator = ConstraintGenerator::new(env, diagnostics, &file.name);
    for node in &file.nodes {
        generator.set_node(node.title());
        for (_, clause) in node.when_clauses() {
            if let Some(expr) = clause.expression() {
                generator.condition(expr, "when clause");
            }
        }
        generator.body(&node.body);
    }
    generator.finish()
}
