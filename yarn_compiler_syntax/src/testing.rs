//! Tree builders for tests.
//!
//! Stand-ins for a front end: each helper builds one tree element with an
//! empty span. Use `.at_line(n)` on statements and expressions when a test
//! needs distinct source positions.

use crate::span::Span;
use crate::tree::*;

pub fn num(n: f64) -> Expression {
    Expression::new(ExprKind::Number(n))
}

pub fn string(s: &str) -> Expression {
    Expression::new(ExprKind::String(s.to_string()))
}

pub fn boolean(b: bool) -> Expression {
    Expression::new(ExprKind::Bool(b))
}

pub fn null() -> Expression {
    Expression::new(ExprKind::Null)
}

pub fn var(name: &str) -> Expression {
    Expression::new(ExprKind::Variable(name.to_string()))
}

pub fn call(function: &str, arguments: Vec<Expression>) -> Expression {
    Expression::new(ExprKind::Call {
        function: function.to_string(),
        arguments,
    })
}

pub fn unary(op: UnaryOp, operand: Expression) -> Expression {
    Expression::new(ExprKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn enum_case(enum_name: &str, case: &str) -> Expression {
    Expression::new(ExprKind::EnumCase {
        enum_name: Some(enum_name.to_string()),
        case: case.to_string(),
    })
}

/// `.Case` with the enum left to inference.
pub fn enum_shorthand(case: &str) -> Expression {
    Expression::new(ExprKind::EnumCase {
        enum_name: None,
        case: case.to_string(),
    })
}

/// A line with a `#line:` tag.
pub fn line(text: &str, line_id: &str) -> Statement {
    Statement::new(StatementKind::Line(line_body(
        vec![TextPart::Text(text.to_string())],
        Some(line_id),
    )))
}

/// A line without any content identifier.
pub fn untagged_line(text: &str) -> Statement {
    Statement::new(StatementKind::Line(line_body(
        vec![TextPart::Text(text.to_string())],
        None,
    )))
}

/// A line built from text and inline expressions.
pub fn line_with_parts(parts: Vec<TextPart>, line_id: &str) -> Statement {
    Statement::new(StatementKind::Line(line_body(parts, Some(line_id))))
}

pub fn line_body(parts: Vec<TextPart>, line_id: Option<&str>) -> Line {
    Line {
        parts,
        tags: line_id.map(|id| vec![format!("line:{id}")]).unwrap_or_default(),
        span: Span::empty(),
    }
}

pub fn text(s: &str) -> TextPart {
    TextPart::Text(s.to_string())
}

pub fn inline(expr: Expression) -> TextPart {
    TextPart::Expression(expr)
}

pub fn option(text: &str, line_id: &str, body: Vec<Statement>) -> ShortcutOption {
    ShortcutOption {
        line: line_body(vec![TextPart::Text(text.to_string())], Some(line_id)),
        condition: None,
        body,
        span: Span::empty(),
    }
}

pub fn option_if(
    text: &str,
    line_id: &str,
    condition: Expression,
    body: Vec<Statement>,
) -> ShortcutOption {
    ShortcutOption {
        condition: Some(condition),
        ..option(text, line_id, body)
    }
}

pub fn options(options: Vec<ShortcutOption>) -> Statement {
    Statement::new(StatementKind::Options(options))
}

pub fn if_clause(condition: Expression, body: Vec<Statement>) -> IfClause {
    IfClause {
        condition: Some(condition),
        body,
        span: Span::empty(),
    }
}

pub fn else_clause(body: Vec<Statement>) -> IfClause {
    IfClause {
        condition: None,
        body,
        span: Span::empty(),
    }
}

pub fn if_statement(clauses: Vec<IfClause>) -> Statement {
    Statement::new(StatementKind::If(clauses))
}

pub fn once(
    condition: Option<Expression>,
    body: Vec<Statement>,
    else_body: Vec<Statement>,
) -> Statement {
    Statement::new(StatementKind::Once(OnceBlock {
        id: None,
        condition,
        body,
        else_body,
    }))
}

pub fn set(variable: &str, value: Expression) -> Statement {
    compound_set(variable, AssignOp::Assign, value)
}

pub fn compound_set(variable: &str, op: AssignOp, value: Expression) -> Statement {
    Statement::new(StatementKind::Set(SetStatement {
        variable: variable.to_string(),
        variable_span: Span::empty(),
        op,
        value,
    }))
}

pub fn declare(variable: &str, value: Expression) -> Statement {
    Statement::new(StatementKind::Declare(DeclareStatement {
        variable: variable.to_string(),
        variable_span: Span::empty(),
        value,
        type_name: None,
        description: None,
    }))
}

pub fn declare_as(variable: &str, value: Expression, type_name: &str) -> Statement {
    Statement::new(StatementKind::Declare(DeclareStatement {
        variable: variable.to_string(),
        variable_span: Span::empty(),
        value,
        type_name: Some(type_name.to_string()),
        description: None,
    }))
}

pub fn enum_definition(name: &str, cases: &[&str]) -> Statement {
    Statement::new(StatementKind::Enum(EnumDefinition {
        name: name.to_string(),
        cases: cases
            .iter()
            .map(|case| EnumCaseDefinition {
                name: case.to_string(),
                raw_value: None,
                description: None,
                span: Span::empty(),
            })
            .collect(),
        description: None,
        span: Span::empty(),
    }))
}

pub fn command(text: &str) -> Statement {
    command_with_parts(vec![TextPart::Text(text.to_string())])
}

pub fn command_with_parts(parts: Vec<TextPart>) -> Statement {
    Statement::new(StatementKind::Command(Command { parts }))
}

pub fn call_statement(expr: Expression) -> Statement {
    Statement::new(StatementKind::Call(expr))
}

pub fn jump(node: &str) -> Statement {
    Statement::new(StatementKind::Jump(JumpTarget::Node(node.to_string())))
}

pub fn jump_to_expression(expr: Expression) -> Statement {
    Statement::new(StatementKind::Jump(JumpTarget::Expression(expr)))
}

pub fn detour(node: &str) -> Statement {
    Statement::new(StatementKind::Detour(JumpTarget::Node(node.to_string())))
}

pub fn return_statement() -> Statement {
    Statement::new(StatementKind::Return)
}

pub fn node(title: &str, body: Vec<Statement>) -> Node {
    Node {
        headers: vec![Header::text(TITLE_HEADER, title)],
        body,
        span: Span::empty(),
    }
}

pub fn node_with_headers(title: &str, extra: Vec<Header>, body: Vec<Statement>) -> Node {
    let mut headers = vec![Header::text(TITLE_HEADER, title)];
    headers.extend(extra);
    Node {
        headers,
        body,
        span: Span::empty(),
    }
}

/// A node with no title header.
pub fn untitled_node(body: Vec<Statement>) -> Node {
    Node {
        headers: vec![Header::text(TAGS_HEADER, "")],
        body,
        span: Span::empty(),
    }
}

pub fn when(clause: WhenClause) -> Header {
    Header::when(clause)
}

pub fn file(name: &str, nodes: Vec<Node>) -> SourceFile {
    SourceFile::new(name, nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_carries_line_tag() {
        let StatementKind::Line(l) = line("Hello", "greeting").kind else {
            panic!("expected a line");
        };
        assert_eq!(l.line_id(), Some("greeting"));
        assert_eq!(l.text(), "Hello");
    }

    #[test]
    fn test_untagged_line_has_no_id() {
        let StatementKind::Line(l) = untagged_line("Hello").kind else {
            panic!("expected a line");
        };
        assert_eq!(l.line_id(), None);
    }

    #[test]
    fn test_node_with_headers_keeps_title_first() {
        let n = node_with_headers("Start", vec![when(WhenClause::Always)], vec![]);
        assert_eq!(n.title(), Some("Start"));
        assert!(n.has_when_clauses());
    }

    #[test]
    fn test_untitled_node() {
        let n = untitled_node(vec![]);
        assert_eq!(n.title(), None);
    }

    #[test]
    fn test_built_file_round_trips_through_json() {
        let f = file(
            "a.yarn",
            vec![node("Start", vec![set("$x", binary(BinaryOp::Add, num(1.0), var("$y")))])],
        );
        let json = f.to_json().unwrap();
        let back = SourceFile::from_json(&json).unwrap();
        assert_eq!(back.nodes[0].title(), Some("Start"));
        assert_eq!(back.nodes[0].body.len(), 1);
    }
}
