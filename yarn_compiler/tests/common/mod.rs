//! Shared helpers for integration tests
// Each test target uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;

use yarn_compiler::program::{Instruction, Node};
use yarn_compiler::{
    compile, CompilationJob, CompilationResult, Library, Program, SourceFile, Value,
};
use yarn_compiler_syntax::testing::file;

/// Name used for single-file jobs.
pub const TEST_FILE: &str = "Test.yarn";

pub fn compile_files(files: Vec<SourceFile>) -> CompilationResult {
    compile(CompilationJob::new(files)).unwrap_or_else(|e| panic!("compile failed: {}", e))
}

pub fn compile_nodes(nodes: Vec<yarn_compiler_syntax::Node>) -> CompilationResult {
    compile_files(vec![file(TEST_FILE, nodes)])
}

/// Compile and require a program with no errors.
pub fn compile_ok(nodes: Vec<yarn_compiler_syntax::Node>) -> (Program, CompilationResult) {
    let mut result = compile_nodes(nodes);
    assert!(
        !result.has_errors(),
        "unexpected errors: {:?}",
        error_messages(&result)
    );
    let program = result
        .program
        .take()
        .unwrap_or_else(|| panic!("no program produced"));
    (program, result)
}

pub fn error_messages(result: &CompilationResult) -> Vec<String> {
    result.errors().map(|d| d.message.clone()).collect()
}

pub fn messages(result: &CompilationResult) -> Vec<String> {
    result.diagnostics.iter().map(|d| d.message.clone()).collect()
}

fn pop(stack: &mut Vec<Value>) -> Value {
    stack.pop().unwrap_or_else(|| panic!("stack underflow"))
}

/// Something observable a node did while running.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Line(String),
    Command(String),
    Detour(String),
    RunNode(String),
    Stop,
}

/// A small interpreter for compiled nodes: enough to run hubs, condition
/// nodes and straight-line content with options.
///
/// Saliency selection picks the first candidate whose conditions all pass.
/// Option selection picks `choice` (0-based) each time.
#[derive(Debug)]
pub struct TestVm<'a> {
    program: &'a Program,
    library: Library,
    pub variables: HashMap<String, Value>,
    pub events: Vec<Event>,
    pub choice: usize,
}

impl<'a> TestVm<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            library: Library::standard(),
            variables: program
                .initial_values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            events: Vec::new(),
            choice: 0,
        }
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.variables.get(name) {
            Some(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    fn node(&self, name: &str) -> &'a Node {
        self.program
            .node(name)
            .unwrap_or_else(|| panic!("no node named {}", name))
    }

    /// Read a variable, evaluating smart-variable nodes.
    pub fn read(&mut self, name: &str) -> Value {
        if let Some(node) = self.program.node(name) {
            if node.tags.iter().any(|t| t == yarn_compiler::SMART_VARIABLE_TAG) {
                let mut stack = Vec::new();
                self.execute(node, &mut stack);
                return stack
                    .pop()
                    .unwrap_or_else(|| panic!("smart variable {} left no value", name));
            }
        }
        self.variables
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("unknown variable {}", name))
    }

    fn candidate_passes(&mut self, node: &str) -> bool {
        let conditions = self
            .node(node)
            .header(yarn_compiler::SALIENCY_VARIABLES_HEADER)
            .unwrap_or("")
            .to_string();
        conditions
            .split(';')
            .filter(|c| !c.is_empty())
            .all(|c| self.read(c) == Value::Bool(true))
    }

    pub fn run(&mut self, name: &str) {
        let node = self.node(name);
        let mut stack = Vec::new();
        self.execute(node, &mut stack);
    }

    fn execute(&mut self, node: &'a Node, stack: &mut Vec<Value>) {
        let mut pc = 0;
        let mut options: Vec<String> = Vec::new();
        let mut candidates: Vec<usize> = Vec::new();
        let label = |l: &str| -> usize {
            *node
                .labels
                .get(l)
                .unwrap_or_else(|| panic!("unknown label {}", l))
        };

        while pc < node.instructions.len() {
            let mut next = pc + 1;
            match &node.instructions[pc] {
                Instruction::PushString(s) => stack.push(Value::String(s.clone())),
                Instruction::PushFloat(n) => stack.push(Value::Number(*n)),
                Instruction::PushBool(b) => stack.push(Value::Bool(*b)),
                Instruction::PushVariable(v) => {
                    let value = self.read(v);
                    stack.push(value);
                }
                Instruction::StoreVariable(v) => {
                    let value = stack.last().cloned().unwrap_or_else(|| panic!("empty store"));
                    self.variables.insert(v.clone(), value);
                }
                Instruction::Pop => {
                    pop(stack);
                }
                Instruction::CallFunc { function } => {
                    let count = match pop(stack) {
                        Value::Number(n) => n as usize,
                        other => panic!("bad argument count {:?}", other),
                    };
                    let mut args: Vec<Value> = (0..count).map(|_| pop(stack)).collect();
                    args.reverse();
                    let result = self
                        .library
                        .invoke(function, &args)
                        .unwrap_or_else(|e| panic!("{}", e));
                    stack.push(result);
                }
                Instruction::JumpTo { label: l } => next = label(l),
                Instruction::JumpIfFalse { label: l } => {
                    if stack.last() == Some(&Value::Bool(false)) {
                        next = label(l);
                    }
                }
                Instruction::Jump => match pop(stack) {
                    Value::String(l) => next = label(&l),
                    other => panic!("bad jump target {:?}", other),
                },
                Instruction::PeekAndJump => match stack.last() {
                    Some(Value::Number(n)) => next = *n as usize,
                    other => panic!("bad jump destination {:?}", other),
                },
                Instruction::RunLine {
                    line_id,
                    substitutions,
                } => {
                    for _ in 0..*substitutions {
                        pop(stack);
                    }
                    self.events.push(Event::Line(line_id.clone()));
                }
                Instruction::RunCommand {
                    text,
                    substitutions,
                } => {
                    for _ in 0..*substitutions {
                        pop(stack);
                    }
                    self.events.push(Event::Command(text.clone()));
                }
                Instruction::AddOption {
                    destination,
                    substitutions,
                    has_condition,
                    ..
                } => {
                    for _ in 0..*substitutions {
                        pop(stack);
                    }
                    let available = !*has_condition || pop(stack) == Value::Bool(true);
                    if available {
                        options.push(destination.clone());
                    }
                }
                Instruction::ShowOptions => {
                    let chosen = options
                        .get(self.choice)
                        .cloned()
                        .unwrap_or_else(|| panic!("option {} not available", self.choice));
                    options.clear();
                    stack.push(Value::String(chosen));
                }
                Instruction::Stop => {
                    self.events.push(Event::Stop);
                    return;
                }
                Instruction::RunNode => match pop(stack) {
                    Value::String(n) => {
                        self.events.push(Event::RunNode(n));
                        return;
                    }
                    other => panic!("bad node name {:?}", other),
                },
                Instruction::PeekAndRunNode => {
                    if let Some(Value::String(n)) = stack.last() {
                        self.events.push(Event::RunNode(n.clone()));
                    }
                    return;
                }
                Instruction::DetourToNode { node: target } => {
                    self.events.push(Event::Detour(target.clone()));
                    self.run(target);
                }
                Instruction::PeekAndDetourToNode => {
                    let target = match stack.last() {
                        Some(Value::String(n)) => n.clone(),
                        other => panic!("bad detour target {:?}", other),
                    };
                    self.events.push(Event::Detour(target.clone()));
                    self.run(&target);
                }
                Instruction::Return => return,
                Instruction::AddSaliencyCandidateFromNode {
                    node: candidate,
                    destination,
                } => {
                    let destination =
                        destination.unwrap_or_else(|| panic!("unpatched candidate {}", candidate));
                    if self.candidate_passes(candidate) {
                        candidates.push(destination);
                    }
                }
                Instruction::SelectSaliencyCandidate => match candidates.first() {
                    Some(&destination) => {
                        stack.push(Value::Number(destination as f64));
                        stack.push(Value::Bool(true));
                    }
                    None => stack.push(Value::Bool(false)),
                },
            }
            pc = next;
        }
        panic!("node {} ran off the end", node.name);
    }
}
