//! Code generation through the public compile entry point, checked by
//! running the output on the test interpreter.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use yarn_compiler::debug_info::Position;
use yarn_compiler::program::{Instruction, OpCode};
use yarn_compiler::{Severity, Value};
use yarn_compiler_syntax::testing::*;
use yarn_compiler_syntax::BinaryOp;

#[test]
fn test_once_block_runs_once() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![once(
            None,
            vec![line("Nice to meet you.", "first")],
            vec![line("You again.", "again")],
        )],
    )]);
    assert_eq!(
        program.initial_value("$Yarn.Internal.Once.Test-Start-0"),
        Some(&Value::Bool(false))
    );

    let mut vm = TestVm::new(&program);
    vm.run("Start");
    vm.run("Start");
    assert_eq!(
        vm.events,
        vec![
            Event::Line("line:first".into()),
            Event::Line("line:again".into())
        ]
    );
}

#[test]
fn test_once_with_condition() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![
            declare("$ready", boolean(false)),
            once(Some(var("$ready")), vec![line("Go!", "go")], vec![]),
            line("Done.", "done"),
        ],
    )]);

    let mut vm = TestVm::new(&program);
    vm.run("Start");
    vm.set("$ready", Value::Bool(true));
    vm.run("Start");
    vm.run("Start");
    assert_eq!(
        vm.events,
        vec![
            Event::Line("line:done".into()),
            Event::Line("line:go".into()),
            Event::Line("line:done".into()),
            Event::Line("line:done".into()),
        ]
    );
}

#[test]
fn test_if_elseif_else_picks_one_branch() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![
            declare("$gold", num(0.0)),
            if_statement(vec![
                if_clause(
                    binary(BinaryOp::Gt, var("$gold"), num(100.0)),
                    vec![line("Rich!", "rich")],
                ),
                if_clause(
                    binary(BinaryOp::Gt, var("$gold"), num(10.0)),
                    vec![line("Comfortable.", "ok")],
                ),
                else_clause(vec![line("Broke.", "broke")]),
            ]),
        ],
    )]);
    assert!(program.node("Start").unwrap().verify_stack().is_ok());

    for (gold, expected) in [(500.0, "line:rich"), (50.0, "line:ok"), (1.0, "line:broke")] {
        let mut vm = TestVm::new(&program);
        vm.set("$gold", Value::Number(gold));
        vm.run("Start");
        assert_eq!(vm.events, vec![Event::Line(expected.into())]);
    }
}

#[test]
fn test_conditional_option_is_filtered() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![
            declare("$has_key", boolean(false)),
            options(vec![
                option_if("Unlock", "unlock", var("$has_key"), vec![]),
                option("Leave", "leave", vec![line("Bye.", "bye")]),
            ]),
        ],
    )]);

    let start = program.node("Start").unwrap();
    assert!(matches!(
        start.instructions[1],
        Instruction::AddOption {
            has_condition: true,
            ..
        }
    ));

    let mut vm = TestVm::new(&program);
    vm.run("Start");
    assert_eq!(vm.events, vec![Event::Line("line:bye".into())]);
}

#[test]
fn test_inline_expressions_become_substitutions() {
    let (program, result) = compile_ok(vec![node(
        "Start",
        vec![
            declare("$gold", num(3.0)),
            line_with_parts(
                vec![text("You have "), inline(var("$gold")), text(" coins.")],
                "coins",
            ),
            command_with_parts(vec![text("wait "), inline(var("$gold"))]),
        ],
    )]);

    let start = program.node("Start").unwrap();
    assert_eq!(
        start.instructions[..4].to_vec(),
        vec![
            Instruction::PushVariable("$gold".into()),
            Instruction::RunLine {
                line_id: "line:coins".into(),
                substitutions: 1,
            },
            Instruction::PushVariable("$gold".into()),
            Instruction::RunCommand {
                text: "wait {0}".into(),
                substitutions: 1,
            },
        ]
    );
    assert_eq!(
        result.string_table.get("line:coins").unwrap().text,
        "You have {0} coins."
    );
}

#[test]
fn test_visited_node_counts_visits() {
    let (program, result) = compile_ok(vec![
        node(
            "Start",
            vec![if_statement(vec![if_clause(
                call("visited", vec![string("Shop")]),
                vec![line("Welcome back.", "back")],
            )])],
        ),
        node("Shop", vec![line("Buy something.", "buy")]),
    ]);

    let counter = "$Yarn.Internal.Visiting.Shop";
    assert!(result.declaration(counter).is_some());
    assert_eq!(program.initial_value(counter), Some(&Value::Number(0.0)));
    let shop = program.node("Shop").unwrap();
    assert_eq!(
        shop.header(yarn_compiler::TRACKING_VARIABLE_HEADER),
        Some(counter)
    );
    assert!(program
        .node("Start")
        .unwrap()
        .header(yarn_compiler::TRACKING_VARIABLE_HEADER)
        .is_none());

    let mut vm = TestVm::new(&program);
    vm.run("Shop");
    vm.run("Shop");
    assert_eq!(vm.number(counter), Some(2.0));
}

#[test]
fn test_jump_and_detour() {
    let (program, _) = compile_ok(vec![
        node("Start", vec![detour("Aside"), jump("End")]),
        node("Aside", vec![line("Meanwhile...", "aside")]),
        node("End", vec![line("The end.", "end")]),
    ]);

    let start = program.node("Start").unwrap();
    assert_eq!(
        start.instructions,
        vec![
            Instruction::DetourToNode {
                node: "Aside".into()
            },
            Instruction::PushString("End".into()),
            Instruction::RunNode,
            Instruction::Return,
        ]
    );

    let mut vm = TestVm::new(&program);
    vm.run("Start");
    assert_eq!(
        vm.events,
        vec![
            Event::Detour("Aside".into()),
            Event::Line("line:aside".into()),
            Event::RunNode("End".into()),
        ]
    );
}

#[test]
fn test_stop_command() {
    let (program, _) = compile_ok(vec![node(
        "Start",
        vec![command("stop"), line("Unreachable.", "never")],
    )]);
    let start = program.node("Start").unwrap();
    assert_eq!(start.count(OpCode::Stop), 1);
    assert_eq!(start.count(OpCode::RunCommand), 0);

    let mut vm = TestVm::new(&program);
    vm.run("Start");
    assert_eq!(vm.events, vec![Event::Stop]);
}

#[test]
fn test_debug_info_positions() {
    let (_, result) = compile_ok(vec![node(
        "Start",
        vec![
            line("One.", "one").at_line(3),
            line("Two.", "two").at_line(4),
        ],
    )]);
    let info = &result.debug_info["Start"];
    assert_eq!(info.file_name, TEST_FILE);
    assert_eq!(info.position(0), Some(Position { line: 3, column: 1 }));
    assert_eq!(info.position(1), Some(Position { line: 4, column: 1 }));
    // the synthesized final Return has no position
    assert_eq!(info.position(2), None);
}

#[test]
fn test_untitled_node_is_dropped_with_warning() {
    let (program, result) = compile_ok(vec![
        node("Start", vec![line("Hi.", "hi")]),
        untitled_node(vec![line("Lost.", "lost")]),
    ]);
    assert_eq!(program.nodes.len(), 1);
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn test_duplicate_line_ids_block_codegen() {
    let result = compile_nodes(vec![node(
        "Start",
        vec![line("Hi.", "hi"), line("Hello.", "hi")],
    )]);
    assert_eq!(error_messages(&result), vec!["Duplicate line ID line:hi"]);
    assert!(result.program.is_none());
}

#[test]
fn test_implicit_line_ids() {
    let (program, result) = compile_ok(vec![node(
        "Start",
        vec![untagged_line("Hi."), untagged_line("Bye.")],
    )]);
    assert!(result.contains_implicit_string_tags);
    let info = result.string_table.get("line:Test-Start-1").unwrap();
    assert_eq!(info.text, "Bye.");
    assert!(info.is_implicit_tag);
    assert_eq!(
        program.node("Start").unwrap().instructions[0],
        Instruction::RunLine {
            line_id: "line:Test-Start-0".into(),
            substitutions: 0,
        }
    );
}
