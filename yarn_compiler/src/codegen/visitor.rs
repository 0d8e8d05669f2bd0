//! Expression and statement code generation.

use yarn_compiler_syntax::{
    ExprKind, Expression, IfClause, JumpTarget, Line, OnceBlock, SetStatement,
    ShortcutOption, Span, Statement, StatementKind,
};

use super::Emitter;
use crate::error::{internal, CResult};
use crate::program::Instruction;
use crate::string_table;
use crate::typecheck::TypeEnvironment;
use crate::types::{Operator, Type};

/// Name of the runtime function for a logical operator.
pub(crate) fn bool_operator(op: Operator) -> String {
    format!("{}.{}", Type::Bool, op.name())
}

/// Emits code for expressions and statements through an [`Emitter`].
#[derive(Debug)]
pub struct CodeGenerator<'a, E: Emitter> {
    emitter: &'a mut E,
    env: &'a TypeEnvironment,
    file: &'a str,
}

impl<'a, E: Emitter> CodeGenerator<'a, E> {
    pub fn new(emitter: &'a mut E, env: &'a TypeEnvironment, file: &'a str) -> Self {
        Self { emitter, env, file }
    }

    fn emit(&mut self, instruction: Instruction, span: Span) {
        self.emitter.emit(instruction, Some(span));
    }

    /// Emit a call to `function` with `count` arguments already on the stack.
    fn call(&mut self, function: String, count: usize, span: Span) {
        self.emit(Instruction::PushFloat(count as f64), span);
        self.emit(Instruction::CallFunc { function }, span);
    }

    fn resolved_type(&self, expr: &Expression) -> Option<&Type> {
        self.env.type_of(expr).filter(|t| !t.is_wildcard())
    }

    /// The runtime function implementing `op` for the first operand with a
    /// concrete type.
    fn operator_function(
        &self,
        op: Operator,
        operands: &[&Expression],
        fallback: Option<&Type>,
        span: Span,
    ) -> CResult<String> {
        let ty = operands
            .iter()
            .find_map(|e| self.resolved_type(e))
            .or(fallback)
            .cloned();
        match ty.as_ref().and_then(|t| t.operator_function(op)) {
            Some(name) => Ok(name),
            None => internal(format!(
                "{}:{}: no implementation of {} for {}",
                self.file,
                span.start_line,
                op,
                ty.map_or_else(|| "an unknown type".to_string(), |t| t.to_string())
            )),
        }
    }

    pub fn expression(&mut self, expr: &Expression) -> CResult<()> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Number(n) => self.emit(Instruction::PushFloat(*n), span),
            ExprKind::String(s) => self.emit(Instruction::PushString(s.clone()), span),
            ExprKind::Bool(b) => self.emit(Instruction::PushBool(*b), span),
            ExprKind::Null => {
                return internal(format!(
                    "{}:{}: null reached code generation",
                    self.file, span.start_line
                ))
            }
            ExprKind::Variable(name) => self.emit(Instruction::PushVariable(name.clone()), span),
            ExprKind::Call {
                function,
                arguments,
            } => {
                for argument in arguments {
                    self.expression(argument)?;
                }
                self.call(function.clone(), arguments.len(), span);
            }
            ExprKind::Unary { op, operand } => {
                self.expression(operand)?;
                let function =
                    self.operator_function(Operator::from_unary(*op), &[operand], None, span)?;
                self.call(function, 1, span);
            }
            ExprKind::Binary { op, left, right } => {
                self.expression(left)?;
                self.expression(right)?;
                let function =
                    self.operator_function(Operator::from_binary(*op), &[left, right], None, span)?;
                self.call(function, 2, span);
            }
            ExprKind::EnumCase { case, .. } => {
                let raw = match self.env.type_of(expr) {
                    Some(Type::Enum(e)) => e.member(case).map(|m| m.raw_value.clone()),
                    _ => None,
                };
                match raw {
                    Some(value) => self.emit(Instruction::push_value(&value), span),
                    None => {
                        return internal(format!(
                            "{}:{}: enum case .{} has no resolved type",
                            self.file, span.start_line, case
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn body(&mut self, body: &[Statement]) -> CResult<()> {
        for statement in body {
            self.statement(statement)?;
        }
        Ok(())
    }

    pub fn statement(&mut self, statement: &Statement) -> CResult<()> {
        let span = statement.span;
        match &statement.kind {
            StatementKind::Line(line) => {
                let (line_id, substitutions) = self.line_parts(line)?;
                self.emit(
                    Instruction::RunLine {
                        line_id,
                        substitutions,
                    },
                    span,
                );
            }
            StatementKind::Options(options) => self.options(options)?,
            StatementKind::If(clauses) => self.if_statement(clauses)?,
            StatementKind::Once(block) => self.once(block, span)?,
            StatementKind::Set(set) => self.set(set, span)?,
            StatementKind::Call(expr) => {
                self.expression(expr)?;
                self.emit(Instruction::Pop, span);
            }
            StatementKind::Command(command) => {
                let text = command.text();
                if text.trim() == "stop" {
                    self.emitter.before_exit();
                    self.emit(Instruction::Stop, span);
                } else {
                    let mut substitutions = 0;
                    for expr in command.substitutions() {
                        self.expression(expr)?;
                        substitutions += 1;
                    }
                    self.emit(
                        Instruction::RunCommand {
                            text,
                            substitutions,
                        },
                        span,
                    );
                }
            }
            StatementKind::Jump(target) => {
                self.emitter.before_exit();
                match target {
                    JumpTarget::Node(node) => {
                        self.emit(Instruction::PushString(node.clone()), span);
                        self.emit(Instruction::RunNode, span);
                    }
                    JumpTarget::Expression(expr) => {
                        self.expression(expr)?;
                        self.emit(Instruction::PeekAndRunNode, span);
                    }
                }
            }
            StatementKind::Detour(target) => match target {
                JumpTarget::Node(node) => {
                    self.emit(Instruction::DetourToNode { node: node.clone() }, span)
                }
                JumpTarget::Expression(expr) => {
                    self.expression(expr)?;
                    self.emit(Instruction::PeekAndDetourToNode, span);
                    self.emit(Instruction::Pop, span);
                }
            },
            StatementKind::Return => {
                self.emitter.before_exit();
                self.emit(Instruction::Return, span);
            }
            StatementKind::Declare(_) | StatementKind::Enum(_) => {}
        }
        Ok(())
    }

    /// Push a line's inline expressions and return its ID and their count.
    fn line_parts(&mut self, line: &Line) -> CResult<(String, usize)> {
        let Some(line_id) = string_table::line_id(line) else {
            return internal(format!(
                "{}:{}: line \"{}\" has no line ID",
                self.file,
                line.span.start_line,
                line.text()
            ));
        };
        let mut substitutions = 0;
        for expr in line.substitutions() {
            self.expression(expr)?;
            substitutions += 1;
        }
        Ok((line_id, substitutions))
    }

    fn options(&mut self, options: &[ShortcutOption]) -> CResult<()> {
        let end = self.emitter.register_label("group_end");
        let mut destinations = Vec::with_capacity(options.len());
        for (index, option) in options.iter().enumerate() {
            let destination = self.emitter.register_label(&format!("option_{}", index + 1));
            let has_condition = match &option.condition {
                Some(condition) => {
                    self.expression(condition)?;
                    true
                }
                None => false,
            };
            let (line_id, substitutions) = self.line_parts(&option.line)?;
            self.emit(
                Instruction::AddOption {
                    line_id,
                    destination: destination.clone(),
                    substitutions,
                    has_condition,
                },
                option.span,
            );
            destinations.push(destination);
        }
        self.emitter.emit(Instruction::ShowOptions, None);
        self.emitter.emit(Instruction::Jump, None);

        for (option, destination) in options.iter().zip(&destinations) {
            self.emitter.bind_label_here(destination);
            self.body(&option.body)?;
            self.emitter.emit(Instruction::JumpTo { label: end.clone() }, None);
        }
        self.emitter.bind_label_here(&end);
        Ok(())
    }

    fn if_statement(&mut self, clauses: &[IfClause]) -> CResult<()> {
        let end = self.emitter.register_label("if_end");
        for clause in clauses {
            match &clause.condition {
                Some(condition) => {
                    let skip = self.emitter.register_label("skip_clause");
                    self.expression(condition)?;
                    self.emit(Instruction::JumpIfFalse { label: skip.clone() }, clause.span);
                    self.emitter.emit(Instruction::Pop, None);
                    self.body(&clause.body)?;
                    self.emitter.emit(Instruction::JumpTo { label: end.clone() }, None);
                    self.emitter.bind_label_here(&skip);
                    self.emitter.emit(Instruction::Pop, None);
                }
                None => self.body(&clause.body)?,
            }
        }
        self.emitter.bind_label_here(&end);
        Ok(())
    }

    fn once(&mut self, block: &OnceBlock, span: Span) -> CResult<()> {
        let Some(id) = &block.id else {
            return internal(format!(
                "{}:{}: once statement has no variable",
                self.file, span.start_line
            ));
        };
        let variable = crate::once_variable_name(id);
        let skip = self.emitter.register_label("once_else");
        let end = self.emitter.register_label("once_end");

        self.emit(Instruction::PushVariable(variable.clone()), span);
        self.call(bool_operator(Operator::Not), 1, span);
        if let Some(condition) = &block.condition {
            self.expression(condition)?;
            self.call(bool_operator(Operator::And), 2, span);
        }
        self.emit(Instruction::JumpIfFalse { label: skip.clone() }, span);
        self.emitter.emit(Instruction::Pop, None);
        self.emitter.emit(Instruction::PushBool(true), None);
        self.emitter.emit(Instruction::StoreVariable(variable), None);
        self.emitter.emit(Instruction::Pop, None);
        self.body(&block.body)?;
        self.emitter.emit(Instruction::JumpTo { label: end.clone() }, None);

        self.emitter.bind_label_here(&skip);
        self.emitter.emit(Instruction::Pop, None);
        self.body(&block.else_body)?;
        self.emitter.bind_label_here(&end);
        Ok(())
    }

    fn set(&mut self, set: &SetStatement, span: Span) -> CResult<()> {
        let declaration = self.env.declarations.get(&set.variable);
        if declaration.is_some_and(|d| d.is_inline_expansion) {
            // Reported during type checking; nothing to store.
            return Ok(());
        }
        match set.op.binary_op() {
            None => self.expression(&set.value)?,
            Some(op) => {
                self.emit(Instruction::PushVariable(set.variable.clone()), set.variable_span);
                self.expression(&set.value)?;
                let variable_type = declaration.map(|d| &d.ty).filter(|t| !t.is_wildcard());
                let function = self.operator_function(
                    Operator::from_binary(op),
                    &[],
                    variable_type.or_else(|| self.resolved_type(&set.value)),
                    span,
                )?;
                self.call(function, 2, span);
            }
        }
        self.emit(Instruction::StoreVariable(set.variable.clone()), span);
        self.emit(Instruction::Pop, span);
        Ok(())
    }
}
