//! Node groups: several nodes sharing a title, chosen between at run time by
//! their `when` conditions.
//!
//! Each member gets one condition node per `when` header, evaluated by the
//! runtime like a smart variable, and a pair of headers listing those
//! conditions and the member's complexity score. The group's title is taken
//! by a hub node that offers every member to the saliency strategy and
//! detours into the one it picks.

use indexmap::IndexMap;
use tracing::{debug, instrument};
use yarn_compiler_syntax::{Node as ScriptNode, WhenClause};

use super::visitor::{bool_operator, CodeGenerator};
use super::{Emitter, NodeBuilder};
use crate::debug_info::{NodeDebugInfo, GENERATED_FILE};
use crate::declaration::Declaration;
use crate::error::CResult;
use crate::program::{Instruction, Node};
use crate::typecheck::TypeEnvironment;
use crate::types::{Operator, Type, Value};

/// Everything a group adds to the program.
#[derive(Debug, Default)]
pub struct GroupOutput {
    /// Condition nodes followed by the hub.
    pub nodes: Vec<(Node, NodeDebugInfo)>,
    /// Condition variables and `once` variables.
    pub declarations: Vec<Declaration>,
}

#[derive(Debug)]
struct NodeGroupCompiler {
    builder: NodeBuilder,
}

impl Emitter for NodeGroupCompiler {
    fn builder(&mut self) -> &mut NodeBuilder {
        &mut self.builder
    }
}

/// How hard a `when` clause is to satisfy; more specific content wins ties.
pub fn clause_complexity(clause: &WhenClause) -> usize {
    match clause {
        WhenClause::Always => 0,
        WhenClause::Once => 1,
        WhenClause::Condition(e) => e.boolean_connective_count() + 1,
        WhenClause::OnceIf(e) => e.boolean_connective_count() + 2,
    }
}

fn condition_variable_name(member: &str, index: usize) -> String {
    format!("{}{}.Condition.{}", crate::INTERNAL_VARIABLE_PREFIX, member, index)
}

/// Compile the condition node for one `when` clause of `member`.
fn compile_condition(
    name: &str,
    member: &str,
    file: &str,
    clause: &WhenClause,
    env: &TypeEnvironment,
) -> CResult<(Node, NodeDebugInfo)> {
    let mut compiler = NodeGroupCompiler {
        builder: NodeBuilder::new(name, file),
    };
    compiler
        .builder
        .node_mut()
        .tags
        .push(crate::SMART_VARIABLE_TAG.to_string());

    if let Some(expression) = clause.expression() {
        CodeGenerator::new(&mut compiler, env, file).expression(expression)?;
    }
    if clause.is_once() {
        // Not yet seen.
        compiler.emit(Instruction::PushVariable(crate::once_variable_name(member)), None);
        compiler.emit(Instruction::PushFloat(1.0), None);
        compiler.emit(
            Instruction::CallFunc {
                function: bool_operator(Operator::Not),
            },
            None,
        );
        if clause.expression().is_some() {
            compiler.emit(Instruction::PushFloat(2.0), None);
            compiler.emit(
                Instruction::CallFunc {
                    function: bool_operator(Operator::And),
                },
                None,
            );
        }
    }
    compiler.emit(Instruction::Return, None);
    Ok(compiler.builder.finish())
}

/// Compile the group `name`.
///
/// `members` are the group's script nodes, already retitled; each one that
/// was compiled into `compiled` becomes a candidate and has its saliency
/// headers set there.
#[instrument(skip_all, fields(group = %name))]
pub fn compile_group(
    name: &str,
    file: &str,
    members: &[&ScriptNode],
    compiled: &mut IndexMap<String, Node>,
    env: &TypeEnvironment,
) -> CResult<GroupOutput> {
    let mut output = GroupOutput::default();
    let mut candidates = Vec::with_capacity(members.len());

    for member in members {
        let Some(title) = member.title() else {
            continue;
        };
        let Some(member_node) = compiled.get_mut(title) else {
            continue;
        };

        let mut complexity = 0;
        let mut variables = Vec::new();
        let mut once = false;
        for (index, (header, clause)) in member.when_clauses().enumerate() {
            complexity += clause_complexity(clause);
            once |= clause.is_once();
            if matches!(clause, WhenClause::Always) {
                continue;
            }
            let variable = condition_variable_name(title, index);
            output
                .nodes
                .push(compile_condition(&variable, title, file, clause, env)?);
            let mut declaration = Declaration::variable(variable.clone(), Type::Bool)
                .with_source(file, Some(title.to_string()), header.span)
                .with_description(format!("Condition {} of node {}", index, title));
            declaration.is_inline_expansion = true;
            declaration.initial_value_expression = clause.expression().cloned();
            output.declarations.push(declaration);
            variables.push(variable);
        }
        if once {
            output.declarations.push(
                Declaration::variable(crate::once_variable_name(title), Type::Bool)
                    .with_default(Value::Bool(false))
                    .with_source(file, Some(title.to_string()), member.title_span())
                    .with_description(format!("Whether node {} has been seen", title)),
            );
        }

        member_node.set_header(crate::SALIENCY_VARIABLES_HEADER, variables.join(";"));
        member_node.set_header(crate::SALIENCY_COMPLEXITY_HEADER, complexity.to_string());
        candidates.push((title.to_string(), once));
    }

    let mut hub = NodeGroupCompiler {
        builder: NodeBuilder::new(name, GENERATED_FILE),
    };
    {
        let node = hub.builder.node_mut();
        node.set_header(yarn_compiler_syntax::TITLE_HEADER, name);
        node.set_header(crate::NODE_GROUP_HUB_HEADER, name);
    }

    let mut registrations = Vec::with_capacity(candidates.len());
    for (member, _) in &candidates {
        registrations.push(hub.builder.here());
        hub.emit(
            Instruction::AddSaliencyCandidateFromNode {
                node: member.clone(),
                destination: None,
            },
            None,
        );
    }
    let none_viable = hub.register_label("nodegroup_none_viable");
    hub.emit(Instruction::SelectSaliencyCandidate, None);
    hub.emit(
        Instruction::JumpIfFalse {
            label: none_viable.clone(),
        },
        None,
    );
    hub.emit(Instruction::Pop, None);
    hub.emit(Instruction::PeekAndJump, None);

    for ((member, once), registration) in candidates.iter().zip(registrations) {
        let destination = hub.builder.here();
        hub.builder.patch(
            registration,
            Instruction::AddSaliencyCandidateFromNode {
                node: member.clone(),
                destination: Some(destination),
            },
        );
        let label = hub.register_label(&format!("nodegroup_run_{}", member));
        hub.bind_label(&label, destination);
        if *once {
            hub.emit(Instruction::PushBool(true), None);
            hub.emit(Instruction::StoreVariable(crate::once_variable_name(member)), None);
            hub.emit(Instruction::Pop, None);
        }
        hub.emit(
            Instruction::DetourToNode {
                node: member.clone(),
            },
            None,
        );
        hub.emit(Instruction::Return, None);
    }

    hub.bind_label_here(&none_viable);
    hub.emit(Instruction::Return, None);

    output.nodes.push(hub.builder.finish());
    debug!(
        members = candidates.len(),
        conditions = output.declarations.len(),
        "group compiled"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::OpCode;
    use yarn_compiler_syntax::testing::*;
    use yarn_compiler_syntax::BinaryOp;

    fn member(title: &str, clauses: Vec<WhenClause>) -> ScriptNode {
        node_with_headers(
            title,
            clauses.into_iter().map(when).collect(),
            vec![line("Hi", "hi")],
        )
    }

    fn compiled_for(members: &[&ScriptNode]) -> IndexMap<String, Node> {
        members
            .iter()
            .map(|m| {
                let title = m.title().unwrap().to_string();
                (title.clone(), Node::new(title))
            })
            .collect()
    }

    #[test]
    fn test_complexity() {
        assert_eq!(clause_complexity(&WhenClause::Always), 0);
        assert_eq!(clause_complexity(&WhenClause::Once), 1);
        assert_eq!(clause_complexity(&WhenClause::Condition(var("$a"))), 1);
        let and = binary(BinaryOp::And, var("$a"), var("$b"));
        assert_eq!(clause_complexity(&WhenClause::Condition(and.clone())), 2);
        assert_eq!(clause_complexity(&WhenClause::OnceIf(and)), 3);
    }

    #[test]
    fn test_hub_layout() {
        let a = member("Greet.0", vec![WhenClause::Always]);
        let b = member("Greet.1", vec![WhenClause::Condition(var("$c"))]);
        let members = [&a, &b];
        let mut compiled = compiled_for(&members);
        let output = compile_group(
            "Greet",
            "a.yarn",
            &members,
            &mut compiled,
            &TypeEnvironment::default(),
        )
        .unwrap();

        // one condition node for the `$c` member, then the hub
        assert_eq!(output.nodes.len(), 2);
        let (hub, _) = output.nodes.last().unwrap();
        assert_eq!(hub.name, "Greet");
        assert_eq!(hub.header(crate::NODE_GROUP_HUB_HEADER), Some("Greet"));
        assert_eq!(hub.count(OpCode::AddSaliencyCandidateFromNode), 2);
        assert_eq!(hub.count(OpCode::DetourToNode), 2);
        assert!(hub.verify_stack().is_ok());

        for instruction in &hub.instructions {
            if let Instruction::AddSaliencyCandidateFromNode { node, destination } = instruction {
                let d = destination.unwrap();
                assert_eq!(
                    hub.instructions[d],
                    Instruction::DetourToNode { node: node.clone() }
                );
            }
        }

        assert_eq!(
            compiled["Greet.0"].header(crate::SALIENCY_VARIABLES_HEADER),
            Some("")
        );
        assert_eq!(
            compiled["Greet.1"].header(crate::SALIENCY_VARIABLES_HEADER),
            Some("$Yarn.Internal.Greet.1.Condition.0")
        );
        assert_eq!(
            compiled["Greet.1"].header(crate::SALIENCY_COMPLEXITY_HEADER),
            Some("1")
        );
    }

    #[test]
    fn test_once_member_marks_itself_seen() {
        let a = member("Bark.0", vec![WhenClause::OnceIf(var("$dog"))]);
        let members = [&a];
        let mut compiled = compiled_for(&members);
        let output = compile_group(
            "Bark",
            "a.yarn",
            &members,
            &mut compiled,
            &TypeEnvironment::default(),
        )
        .unwrap();

        let (condition, _) = &output.nodes[0];
        assert_eq!(condition.tags, vec!["Yarn.SmartVariable"]);
        assert_eq!(
            condition.instructions,
            vec![
                Instruction::PushVariable("$dog".into()),
                Instruction::PushVariable("$Yarn.Internal.Once.Bark.0".into()),
                Instruction::PushFloat(1.0),
                Instruction::CallFunc {
                    function: "Bool.Not".into()
                },
                Instruction::PushFloat(2.0),
                Instruction::CallFunc {
                    function: "Bool.And".into()
                },
                Instruction::Return,
            ]
        );

        let (hub, _) = output.nodes.last().unwrap();
        assert!(hub
            .instructions
            .contains(&Instruction::StoreVariable("$Yarn.Internal.Once.Bark.0".into())));
        assert!(output
            .declarations
            .iter()
            .any(|d| d.name == "$Yarn.Internal.Once.Bark.0"
                && d.default_value == Some(Value::Bool(false))));
        assert!(hub.verify_stack().is_ok());
    }

    #[test]
    fn test_uncompiled_members_are_not_candidates() {
        let a = member("G.0", vec![WhenClause::Always]);
        let b = member("G.1", vec![WhenClause::Always]);
        let members = [&a, &b];
        let mut compiled = compiled_for(&[&a]);
        let env = TypeEnvironment::default();
        let output = compile_group("G", "a.yarn", &members, &mut compiled, &env).unwrap();
        let (hub, _) = output.nodes.last().unwrap();
        assert_eq!(hub.count(OpCode::AddSaliencyCandidateFromNode), 1);
    }
}
