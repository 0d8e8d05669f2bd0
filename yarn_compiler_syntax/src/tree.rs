//! Parse tree for dialogue scripts.
//!
//! This is the shape the front end hands to the compiler: files contain
//! nodes, nodes contain headers and a body of statements, and statements
//! contain expressions. Every expression carries an [`ExprId`] so that later
//! passes can attach information (such as resolved types) in side tables
//! without mutating the tree.
//!
//! # Module Organization
//!
//! - [`SourceFile`], [`Node`], [`Header`]: the outer structure
//! - [`Statement`], [`StatementKind`]: node bodies
//! - [`Expression`], [`ExprKind`]: values, operators and calls

use serde::{Deserialize, Serialize};

use crate::error::{SyntaxError, SyntaxResult};
use crate::span::Span;

/// Identity of an expression within one compilation job.
pub type ExprId = u32;

/// Header key holding a node's title.
pub const TITLE_HEADER: &str = "title";
/// Header key holding a node's space-separated tags.
pub const TAGS_HEADER: &str = "tags";
/// Header key holding a node's visit-tracking preference.
pub const TRACKING_HEADER: &str = "tracking";
/// Header key for node-group conditions.
pub const WHEN_HEADER: &str = "when";

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// File-level `#tag` annotations.
    #[serde(default)]
    pub file_tags: Vec<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            nodes,
            file_tags: Vec::new(),
        }
    }

    /// Decode a tree produced by an external front end.
    pub fn from_json(json: &str) -> SyntaxResult<Self> {
        let mut file: SourceFile = serde_json::from_str(json)?;
        file.validate()?;
        file.number_expressions(0);
        Ok(file)
    }

    pub fn to_json(&self) -> SyntaxResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks a well-formed front end guarantees.
    pub fn validate(&self) -> SyntaxResult<()> {
        if self.name.trim().is_empty() {
            return Err(SyntaxError::EmptyFileName);
        }
        for node in &self.nodes {
            if node.headers.is_empty() {
                return Err(SyntaxError::NodeWithoutHeaders { span: node.span });
            }
            for statement in &node.body {
                statement.validate()?;
            }
        }
        Ok(())
    }

    /// The file name without directories or extension.
    pub fn stem(&self) -> &str {
        let base = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.name.as_str());
        match base.rfind('.') {
            Some(0) | None => base,
            Some(dot) => &base[..dot],
        }
    }

    /// Assign sequential expression ids starting at `next`, returning the
    /// next unused id.
    pub fn number_expressions(&mut self, mut next: ExprId) -> ExprId {
        for node in &mut self.nodes {
            for header in &mut node.headers {
                if let HeaderValue::When(clause) = &mut header.value {
                    if let Some(expr) = clause.expression_mut() {
                        expr.walk_mut(&mut |e| {
                            e.id = next;
                            next += 1;
                        });
                    }
                }
            }
            for statement in &mut node.body {
                statement.for_each_expression_mut(&mut |e| {
                    e.id = next;
                    next += 1;
                });
            }
        }
        next
    }
}

/// A node: headers followed by a body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

impl Node {
    pub fn header(&self, key: &str) -> Option<&Header> {
        self.headers.iter().find(|h| h.key == key)
    }

    /// Text value of the first header with `key`.
    pub fn header_text(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .filter(|h| h.key == key)
            .find_map(|h| h.value.as_text())
    }

    pub fn title(&self) -> Option<&str> {
        self.header_text(TITLE_HEADER).map(str::trim)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        match self.headers.iter_mut().find(|h| h.key == TITLE_HEADER) {
            Some(header) => header.value = HeaderValue::Text(title),
            None => self.headers.insert(0, Header::text(TITLE_HEADER, title)),
        }
    }

    /// Span of the title header, or of the node when it has none.
    pub fn title_span(&self) -> Span {
        self.header(TITLE_HEADER).map_or(self.span, |h| h.span)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.header_text(TAGS_HEADER)
            .map(|t| t.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn when_clauses(&self) -> impl Iterator<Item = (&Header, &WhenClause)> {
        self.headers.iter().filter_map(|h| match &h.value {
            HeaderValue::When(clause) => Some((h, clause)),
            HeaderValue::Text(_) => None,
        })
    }

    pub fn has_when_clauses(&self) -> bool {
        self.when_clauses().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: HeaderValue,
    #[serde(default)]
    pub span: Span,
}

impl Header {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: HeaderValue::Text(value.into()),
            span: Span::empty(),
        }
    }

    pub fn when(clause: WhenClause) -> Self {
        Self {
            key: WHEN_HEADER.to_string(),
            value: HeaderValue::When(clause),
            span: Span::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderValue {
    Text(String),
    When(WhenClause),
}

impl HeaderValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(text) => Some(text),
            HeaderValue::When(_) => None,
        }
    }
}

/// The value of a `when:` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhenClause {
    /// `when: always`
    Always,
    /// `when: once`
    Once,
    /// `when: <expression>`
    Condition(Expression),
    /// `when: once if <expression>`
    OnceIf(Expression),
}

impl WhenClause {
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            WhenClause::Condition(e) | WhenClause::OnceIf(e) => Some(e),
            WhenClause::Always | WhenClause::Once => None,
        }
    }

    pub fn expression_mut(&mut self) -> Option<&mut Expression> {
        match self {
            WhenClause::Condition(e) | WhenClause::OnceIf(e) => Some(e),
            WhenClause::Always | WhenClause::Once => None,
        }
    }

    pub fn is_once(&self) -> bool {
        matches!(self, WhenClause::Once | WhenClause::OnceIf(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Line(Line),
    /// A group of shortcut options (`-> ...`).
    Options(Vec<ShortcutOption>),
    /// `<<if>>`, any `<<elseif>>`s, and an optional `<<else>>`.
    If(Vec<IfClause>),
    Once(OnceBlock),
    Set(SetStatement),
    /// `<<call f(...)>>`
    Call(Expression),
    Command(Command),
    Declare(DeclareStatement),
    Enum(EnumDefinition),
    Jump(JumpTarget),
    Detour(JumpTarget),
    Return,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            span: Span::empty(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.span = Span::at_line(line);
        self
    }

    fn validate(&self) -> SyntaxResult<()> {
        match &self.kind {
            StatementKind::Options(options) if options.is_empty() => {
                Err(SyntaxError::EmptyOptionGroup { span: self.span })
            }
            StatementKind::Options(options) => {
                options
                    .iter()
                    .flat_map(|o| &o.body)
                    .try_for_each(Statement::validate)
            }
            StatementKind::If(clauses) => {
                let Some((first, rest)) = clauses.split_first() else {
                    return Err(SyntaxError::EmptyIf { span: self.span });
                };
                if first.condition.is_none() {
                    return Err(SyntaxError::EmptyIf { span: self.span });
                }
                // Only the last clause may be an `else`.
                if let Some(pos) = rest.iter().position(|c| c.condition.is_none()) {
                    if pos + 1 != rest.len() {
                        return Err(SyntaxError::MisplacedElse {
                            span: rest[pos].span,
                        });
                    }
                }
                clauses
                    .iter()
                    .flat_map(|c| &c.body)
                    .try_for_each(Statement::validate)
            }
            StatementKind::Once(block) => block
                .body
                .iter()
                .chain(&block.else_body)
                .try_for_each(Statement::validate),
            StatementKind::Enum(definition) if definition.cases.is_empty() => {
                Err(SyntaxError::EmptyEnum {
                    name: definition.name.clone(),
                    span: definition.span,
                })
            }
            _ => Ok(()),
        }
    }

    /// Visit every expression in this statement and its nested bodies, in
    /// source order.
    pub fn for_each_expression_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        match &mut self.kind {
            StatementKind::Line(line) => line.for_each_expression_mut(f),
            StatementKind::Options(options) => {
                for option in options {
                    option.line.for_each_expression_mut(f);
                    if let Some(condition) = &mut option.condition {
                        condition.walk_mut(f);
                    }
                    for statement in &mut option.body {
                        statement.for_each_expression_mut(f);
                    }
                }
            }
            StatementKind::If(clauses) => {
                for clause in clauses {
                    if let Some(condition) = &mut clause.condition {
                        condition.walk_mut(f);
                    }
                    for statement in &mut clause.body {
                        statement.for_each_expression_mut(f);
                    }
                }
            }
            StatementKind::Once(block) => {
                if let Some(condition) = &mut block.condition {
                    condition.walk_mut(f);
                }
                for statement in block.body.iter_mut().chain(block.else_body.iter_mut()) {
                    statement.for_each_expression_mut(f);
                }
            }
            StatementKind::Set(set) => set.value.walk_mut(f),
            StatementKind::Call(expr) => expr.walk_mut(f),
            StatementKind::Command(command) => {
                for part in &mut command.parts {
                    if let TextPart::Expression(e) = part {
                        e.walk_mut(f);
                    }
                }
            }
            StatementKind::Declare(declare) => declare.value.walk_mut(f),
            StatementKind::Jump(target) | StatementKind::Detour(target) => {
                if let JumpTarget::Expression(e) = target {
                    e.walk_mut(f);
                }
            }
            StatementKind::Enum(_) | StatementKind::Return => {}
        }
    }

    /// Nested statement bodies, for passes that only care about structure.
    pub fn nested_bodies(&self) -> Vec<&[Statement]> {
        match &self.kind {
            StatementKind::Options(options) => {
                options.iter().map(|o| o.body.as_slice()).collect()
            }
            StatementKind::If(clauses) => clauses.iter().map(|c| c.body.as_slice()).collect(),
            StatementKind::Once(block) => vec![block.body.as_slice(), block.else_body.as_slice()],
            _ => Vec::new(),
        }
    }
}

/// A piece of line or command text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPart {
    Text(String),
    /// An inline `{expression}`.
    Expression(Expression),
}

/// Render text parts with `{0}`, `{1}`, ... in place of inline expressions.
pub fn compose_text(parts: &[TextPart]) -> String {
    let mut out = String::new();
    let mut index = 0;
    for part in parts {
        match part {
            TextPart::Text(text) => out.push_str(text),
            TextPart::Expression(_) => {
                out.push_str(&format!("{{{index}}}"));
                index += 1;
            }
        }
    }
    out
}

fn inline_expressions(parts: &[TextPart]) -> impl Iterator<Item = &Expression> {
    parts.iter().filter_map(|p| match p {
        TextPart::Expression(e) => Some(e),
        TextPart::Text(_) => None,
    })
}

/// A line of dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub parts: Vec<TextPart>,
    /// Hashtags without the leading `#`, including any `line:` tag.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub span: Span,
}

impl Line {
    /// The content identifier from the first `#line:` tag.
    pub fn line_id(&self) -> Option<&str> {
        self.line_id_tags().next()
    }

    pub fn line_id_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().filter_map(|t| t.strip_prefix("line:"))
    }

    /// Tags other than the content identifier.
    pub fn metadata_tags(&self) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| !t.starts_with("line:"))
            .cloned()
            .collect()
    }

    pub fn text(&self) -> String {
        compose_text(&self.parts)
    }

    pub fn substitutions(&self) -> impl Iterator<Item = &Expression> {
        inline_expressions(&self.parts)
    }

    fn for_each_expression_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        for part in &mut self.parts {
            if let TextPart::Expression(e) = part {
                e.walk_mut(f);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortcutOption {
    pub line: Line,
    /// `<<if ...>>` attached to the option line.
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfClause {
    /// `None` for the trailing `<<else>>`.
    pub condition: Option<Expression>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub span: Span,
}

/// `<<once>> ... <<else>> ... <<endonce>>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnceBlock {
    /// Content identifier; synthesized by the compiler when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub condition: Option<Expression>,
    #[serde(default)]
    pub body: Vec<Statement>,
    #[serde(default)]
    pub else_body: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetStatement {
    pub variable: String,
    #[serde(default)]
    pub variable_span: Span,
    pub op: AssignOp,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub parts: Vec<TextPart>,
}

impl Command {
    pub fn text(&self) -> String {
        compose_text(&self.parts).trim().to_string()
    }

    pub fn substitutions(&self) -> impl Iterator<Item = &Expression> {
        inline_expressions(&self.parts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareStatement {
    pub variable: String,
    #[serde(default)]
    pub variable_span: Span,
    pub value: Expression,
    /// Explicit `as Type` annotation.
    #[serde(default)]
    pub type_name: Option<String>,
    /// Doc comment attached by the front end.
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub name: String,
    pub cases: Vec<EnumCaseDefinition>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumCaseDefinition {
    pub name: String,
    #[serde(default)]
    pub raw_value: Option<EnumRawValue>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumRawValue {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpTarget {
    Node(String),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    /// Assigned by [`SourceFile::number_expressions`].
    #[serde(default)]
    pub id: ExprId,
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Number(f64),
    String(String),
    Bool(bool),
    Null,
    Variable(String),
    Call {
        function: String,
        arguments: Vec<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `Enum.Case`, or `.Case` when the enum is inferred from context.
    EnumCase {
        enum_name: Option<String>,
        case: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Minus,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            id: 0,
            kind,
            span: Span::empty(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.span = Span::at_line(line);
        self
    }

    /// Direct sub-expressions, left to right.
    pub fn children(&self) -> Vec<&Expression> {
        match &self.kind {
            ExprKind::Call { arguments, .. } => arguments.iter().collect(),
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            _ => Vec::new(),
        }
    }

    /// Pre-order traversal.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Pre-order traversal with mutable access.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expression)) {
        f(self);
        match &mut self.kind {
            ExprKind::Call { arguments, .. } => {
                for argument in arguments {
                    argument.walk_mut(f);
                }
            }
            ExprKind::Unary { operand, .. } => operand.walk_mut(f),
            ExprKind::Binary { left, right, .. } => {
                left.walk_mut(f);
                right.walk_mut(f);
            }
            _ => {}
        }
    }

    pub fn references_variable(&self, name: &str) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(&e.kind, ExprKind::Variable(v) if v == name) {
                found = true;
            }
        });
        found
    }

    /// Whether this expression is a compile-time constant usable as a
    /// stored variable's default.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Bool(_) => true,
            ExprKind::EnumCase { .. } => true,
            ExprKind::Unary {
                op: UnaryOp::Minus,
                operand,
            } => matches!(operand.kind, ExprKind::Number(_)),
            _ => false,
        }
    }

    /// Count of `and`/`or`/`xor`/`not` operators in the expression.
    pub fn boolean_connective_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |e| match &e.kind {
            ExprKind::Binary { op, .. } if op.is_logical() => count += 1,
            ExprKind::Unary {
                op: UnaryOp::Not, ..
            } => count += 1,
            _ => {}
        });
        count
    }

    /// Approximate source text, used in diagnostics.
    pub fn source_text(&self) -> String {
        match &self.kind {
            ExprKind::Number(n) => format_number(*n),
            ExprKind::String(s) => format!("{s:?}"),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Null => "null".to_string(),
            ExprKind::Variable(name) => name.clone(),
            ExprKind::Call {
                function,
                arguments,
            } => {
                let args: Vec<String> = arguments.iter().map(Expression::source_text).collect();
                format!("{}({})", function, args.join(", "))
            }
            ExprKind::Unary { op, operand } => {
                format!("{}{}", op.symbol(), operand.nested_source_text())
            }
            ExprKind::Binary { op, left, right } => format!(
                "{} {} {}",
                left.nested_source_text(),
                op.symbol(),
                right.nested_source_text()
            ),
            ExprKind::EnumCase { enum_name, case } => match enum_name {
                Some(name) => format!("{name}.{case}"),
                None => format!(".{case}"),
            },
        }
    }

    fn nested_source_text(&self) -> String {
        match self.kind {
            ExprKind::Binary { .. } => format!("({})", self.source_text()),
            _ => self.source_text(),
        }
    }
}

/// Format a number the way script text writes it (`1`, not `1.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
