//! Bytecode generation.
//!
//! # Module Organization
//!
//! - `visitor`: expressions and statements, shared by every backend
//! - `file_compiler`: one compiled node per script node
//! - `smart_variable`: one node per smart variable
//! - `node_group`: condition nodes and the hub node for each node group
//!
//! Backends own a [`NodeBuilder`] and expose it through [`Emitter`]; the
//! visitor only ever talks to the trait.

mod file_compiler;
mod node_group;
mod smart_variable;
mod visitor;

use yarn_compiler_syntax::Span;

use crate::debug_info::{NodeDebugInfo, Position};
use crate::program::{Instruction, Node};

pub use file_compiler::{compile_file, FileOutput};
pub use node_group::{clause_complexity, compile_group, GroupOutput};
pub use smart_variable::compile_smart_variable;
pub use visitor::CodeGenerator;

/// A node under construction.
#[derive(Debug)]
pub struct NodeBuilder {
    node: Node,
    debug_info: NodeDebugInfo,
    next_label: usize,
}

impl NodeBuilder {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            debug_info: NodeDebugInfo::new(file_name, name.clone()),
            node: Node::new(name),
            next_label: 0,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    /// Index the next instruction will have.
    pub fn here(&self) -> usize {
        self.node.instructions.len()
    }

    pub fn emit(&mut self, instruction: Instruction, span: Option<Span>) {
        if let Some(span) = span.filter(|s| s.start_line > 0) {
            self.debug_info.positions.insert(
                self.here(),
                Position {
                    line: span.start_line,
                    column: span.start_column,
                },
            );
        }
        self.node.instructions.push(instruction);
    }

    /// Replace the instruction at `index`.
    pub fn patch(&mut self, index: usize, instruction: Instruction) {
        if let Some(slot) = self.node.instructions.get_mut(index) {
            *slot = instruction;
        }
    }

    pub fn register_label(&mut self, hint: &str) -> String {
        let label = format!("L{}_{}", self.next_label, hint);
        self.next_label += 1;
        label
    }

    pub fn bind_label(&mut self, label: &str, index: usize) {
        self.node.labels.insert(label.to_string(), index);
        self.debug_info.labels.insert(label.to_string(), index);
    }

    pub fn finish(self) -> (Node, NodeDebugInfo) {
        (self.node, self.debug_info)
    }
}

/// Where generated code goes.
pub trait Emitter {
    fn builder(&mut self) -> &mut NodeBuilder;

    fn emit(&mut self, instruction: Instruction, span: Option<Span>) {
        self.builder().emit(instruction, span);
    }

    /// Allocate a label name that is unique within the node.
    fn register_label(&mut self, hint: &str) -> String {
        self.builder().register_label(hint)
    }

    fn bind_label(&mut self, label: &str, index: usize) {
        self.builder().bind_label(label, index);
    }

    /// Bind `label` to the next instruction to be emitted.
    fn bind_label_here(&mut self, label: &str) {
        let here = self.builder().here();
        self.bind_label(label, here);
    }

    /// Called before any instruction that leaves the node.
    fn before_exit(&mut self) {}
}
