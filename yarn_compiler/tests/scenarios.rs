//! End-to-end compiles of small scripts.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use yarn_compiler::program::Instruction;
use yarn_compiler::{Type, Value};
use yarn_compiler_syntax::testing::*;
use yarn_compiler_syntax::{BinaryOp, WhenClause};

#[test]
fn test_assigning_string_to_number_variable() {
    let result = compile_nodes(vec![node(
        "Start",
        vec![declare("$x", num(1.0)), set("$x", string("a"))],
    )]);

    assert_eq!(
        error_messages(&result),
        vec!["$x (Number) cannot be assigned a String"]
    );
    assert!(result.program.is_none());
    // declarations are still reported
    assert_eq!(result.declaration("$x").map(|d| d.ty.clone()), Some(Type::Number));
}

#[test]
fn test_undeclared_variable_is_inferred_from_assignment() {
    let (program, result) = compile_ok(vec![node("Start", vec![set("$y", num(1.0))])]);

    assert!(result.diagnostics.is_empty());
    let declaration = result.declaration("$y").unwrap();
    assert!(declaration.is_implicit);
    assert_eq!(declaration.ty, Type::Number);
    assert_eq!(program.initial_value("$y"), Some(&Value::Number(1.0)));
}

#[test]
fn test_two_options_layout() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![
            line("Where to?", "q"),
            options(vec![
                option("Left", "left", vec![line("You go left.", "went_left")]),
                option("Right", "right", vec![line("You go right.", "went_right")]),
            ]),
        ],
    )]);

    let start = program.node("Start").unwrap();
    let add_option = |id: &str, destination: &str| Instruction::AddOption {
        line_id: format!("line:{}", id),
        destination: destination.to_string(),
        substitutions: 0,
        has_condition: false,
    };
    let run_line = |id: &str| Instruction::RunLine {
        line_id: format!("line:{}", id),
        substitutions: 0,
    };
    let to_end = || Instruction::JumpTo {
        label: "L0_group_end".to_string(),
    };
    assert_eq!(
        start.instructions,
        vec![
            run_line("q"),
            add_option("left", "L1_option_1"),
            add_option("right", "L2_option_2"),
            Instruction::ShowOptions,
            Instruction::Jump,
            run_line("went_left"),
            to_end(),
            run_line("went_right"),
            to_end(),
            Instruction::Return,
        ]
    );
    assert_eq!(start.labels["L1_option_1"], 5);
    assert_eq!(start.labels["L2_option_2"], 7);
    assert_eq!(start.labels["L0_group_end"], 9);
    assert!(start.verify_stack().is_ok());

    let mut vm = TestVm::new(&program);
    vm.choice = 1;
    vm.run("Start");
    assert_eq!(
        vm.events,
        vec![
            Event::Line("line:q".into()),
            Event::Line("line:went_right".into())
        ]
    );
}

fn greet_group(second: WhenClause) -> Vec<yarn_compiler_syntax::Node> {
    vec![
        node(
            "Setup",
            vec![declare("$c", boolean(false)), declare("$d", boolean(false))],
        ),
        node_with_headers(
            "Greet",
            vec![when(WhenClause::Always)],
            vec![line("Hello.", "hello")],
        ),
        node_with_headers("Greet", vec![when(second)], vec![line("Hey, you!", "hey")]),
    ]
}

#[test]
fn test_group_hub_skips_failing_member() {
    let (program, _) = compile_ok(greet_group(WhenClause::Condition(var("$c"))));

    let hub = program.node("Greet").unwrap();
    let registered: Vec<&str> = hub
        .instructions
        .iter()
        .filter_map(|i| match i {
            Instruction::AddSaliencyCandidateFromNode { node, .. } => Some(node.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(registered, vec!["Greet.0", "Greet.1"]);

    let mut vm = TestVm::new(&program);
    assert_eq!(vm.read("$Yarn.Internal.Greet.1.Condition.0"), Value::Bool(false));
    vm.run("Greet");
    assert_eq!(
        vm.events,
        vec![
            Event::Detour("Greet.0".into()),
            Event::Line("line:hello".into())
        ]
    );

    let mut vm = TestVm::new(&program);
    vm.set("$c", Value::Bool(true));
    assert_eq!(vm.read("$Yarn.Internal.Greet.1.Condition.0"), Value::Bool(true));
}

#[test]
fn test_group_hub_returns_when_nothing_passes() {
    let nodes = vec![
        node(
            "Setup",
            vec![declare("$c", boolean(false)), declare("$d", boolean(false))],
        ),
        node_with_headers(
            "Greet",
            vec![when(WhenClause::Condition(var("$c")))],
            vec![line("Hello.", "hello")],
        ),
        node_with_headers(
            "Greet",
            vec![when(WhenClause::Condition(var("$d")))],
            vec![line("Hey, you!", "hey")],
        ),
    ];
    let (program, _) = compile_ok(nodes);

    let mut vm = TestVm::new(&program);
    vm.run("Greet");
    assert!(vm.events.is_empty());
}

#[test]
fn test_self_referential_declaration() {
    let result = compile_nodes(vec![node(
        "Start",
        vec![declare("$a", binary(BinaryOp::Add, var("$a"), num(1.0)))],
    )]);

    let errors = error_messages(&result);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].starts_with("$a's initial value refers to $a itself"));
    assert!(result.program.is_none());
}
