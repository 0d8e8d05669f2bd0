//! Compiled output: nodes of stack-machine instructions.
//!
//! Jumps inside a node name labels; the runtime resolves a label through the
//! node's label table. The only absolute instruction indices are the
//! destinations of saliency candidates in node-group hubs.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use yarn_compiler_syntax::format_number;

use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    JumpTo,
    Jump,
    PeekAndJump,
    RunLine,
    RunCommand,
    AddOption,
    ShowOptions,
    PushString,
    PushFloat,
    PushBool,
    JumpIfFalse,
    Pop,
    CallFunc,
    PushVariable,
    StoreVariable,
    Stop,
    RunNode,
    PeekAndRunNode,
    DetourToNode,
    PeekAndDetourToNode,
    Return,
    AddSaliencyCandidateFromNode,
    SelectSaliencyCandidate,
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Jump to a label in this node.
    JumpTo { label: String },
    /// Pop a label name and jump to it.
    Jump,
    /// Jump to the instruction index on top of the stack, leaving it there.
    PeekAndJump,
    /// Pop `substitutions` values and deliver the line.
    RunLine { line_id: String, substitutions: usize },
    /// Pop `substitutions` values and deliver the command text.
    RunCommand { text: String, substitutions: usize },
    /// Pop `substitutions` values, then the condition if there is one, and
    /// register an option.
    AddOption {
        line_id: String,
        destination: String,
        substitutions: usize,
        has_condition: bool,
    },
    /// Present the registered options; pushes the chosen destination.
    ShowOptions,
    PushString(String),
    PushFloat(f64),
    PushBool(bool),
    /// Jump to a label if the top of the stack is false. Does not pop.
    JumpIfFalse { label: String },
    Pop,
    /// Pop an argument count, then that many arguments, and push the result.
    CallFunc { function: String },
    PushVariable(String),
    /// Store the top of the stack. Does not pop.
    StoreVariable(String),
    Stop,
    /// Pop a node name and run that node.
    RunNode,
    /// Run the node named on top of the stack, leaving the name there.
    PeekAndRunNode,
    DetourToNode { node: String },
    /// Detour to the node named on top of the stack, leaving the name there.
    PeekAndDetourToNode,
    Return,
    /// Offer `node` to the saliency strategy; if it is chosen, execution
    /// continues at `destination`.
    AddSaliencyCandidateFromNode {
        node: String,
        destination: Option<usize>,
    },
    /// Pushes the chosen destination and `true`, or only `false` when no
    /// candidate passed.
    SelectSaliencyCandidate,
}

impl Instruction {
    pub fn opcode(&self) -> OpCode {
        match self {
            Instruction::JumpTo { .. } => OpCode::JumpTo,
            Instruction::Jump => OpCode::Jump,
            Instruction::PeekAndJump => OpCode::PeekAndJump,
            Instruction::RunLine { .. } => OpCode::RunLine,
            Instruction::RunCommand { .. } => OpCode::RunCommand,
            Instruction::AddOption { .. } => OpCode::AddOption,
            Instruction::ShowOptions => OpCode::ShowOptions,
            Instruction::PushString(_) => OpCode::PushString,
            Instruction::PushFloat(_) => OpCode::PushFloat,
            Instruction::PushBool(_) => OpCode::PushBool,
            Instruction::JumpIfFalse { .. } => OpCode::JumpIfFalse,
            Instruction::Pop => OpCode::Pop,
            Instruction::CallFunc { .. } => OpCode::CallFunc,
            Instruction::PushVariable(_) => OpCode::PushVariable,
            Instruction::StoreVariable(_) => OpCode::StoreVariable,
            Instruction::Stop => OpCode::Stop,
            Instruction::RunNode => OpCode::RunNode,
            Instruction::PeekAndRunNode => OpCode::PeekAndRunNode,
            Instruction::DetourToNode { .. } => OpCode::DetourToNode,
            Instruction::PeekAndDetourToNode => OpCode::PeekAndDetourToNode,
            Instruction::Return => OpCode::Return,
            Instruction::AddSaliencyCandidateFromNode { .. } => {
                OpCode::AddSaliencyCandidateFromNode
            }
            Instruction::SelectSaliencyCandidate => OpCode::SelectSaliencyCandidate,
        }
    }

    /// Whether execution never falls through to the next instruction.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::JumpTo { .. }
                | Instruction::Jump
                | Instruction::PeekAndJump
                | Instruction::Stop
                | Instruction::RunNode
                | Instruction::PeekAndRunNode
                | Instruction::Return
        )
    }

    pub fn push_value(value: &Value) -> Instruction {
        match value {
            Value::Number(n) => Instruction::PushFloat(*n),
            Value::String(s) => Instruction::PushString(s.clone()),
            Value::Bool(b) => Instruction::PushBool(*b),
        }
    }

    fn operands(&self) -> String {
        match self {
            Instruction::JumpTo { label } | Instruction::JumpIfFalse { label } => label.clone(),
            Instruction::RunLine {
                line_id,
                substitutions,
            } => format!("{} {}", line_id, substitutions),
            Instruction::RunCommand {
                text,
                substitutions,
            } => format!("\"{}\" {}", text, substitutions),
            Instruction::AddOption {
                line_id,
                destination,
                substitutions,
                has_condition,
            } => format!(
                "{} {} {} {}",
                line_id, destination, substitutions, has_condition
            ),
            Instruction::PushString(s) => format!("\"{}\"", s),
            Instruction::PushFloat(n) => format_number(*n),
            Instruction::PushBool(b) => b.to_string(),
            Instruction::CallFunc { function } => function.clone(),
            Instruction::PushVariable(name) | Instruction::StoreVariable(name) => name.clone(),
            Instruction::DetourToNode { node } => node.clone(),
            Instruction::AddSaliencyCandidateFromNode { node, destination } => match destination {
                Some(index) => format!("{} {}", node, index),
                None => format!("{} ?", node),
            },
            _ => String::new(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operands = self.operands();
        if operands.is_empty() {
            write!(f, "{}", self.opcode())
        } else {
            write!(f, "{:<20} {}", self.opcode().to_string(), operands)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHeader {
    pub key: String,
    pub value: String,
}

/// A compiled node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Label name to instruction index.
    pub labels: IndexMap<String, usize>,
    pub headers: Vec<NodeHeader>,
    pub tags: Vec<String>,
}

/// Why a node fails stack verification.
#[derive(Debug, Clone, PartialEq)]
pub enum StackError {
    Underflow { index: usize },
    InconsistentDepth { index: usize, expected: usize, found: usize },
    UnknownLabel { index: usize, label: String },
    BadDestination { index: usize },
    FallsOffEnd,
    MissingFinalReturn,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::Underflow { index } => write!(f, "stack underflow at {}", index),
            StackError::InconsistentDepth {
                index,
                expected,
                found,
            } => write!(
                f,
                "instruction {} reached with stack depth {} and {}",
                index, expected, found
            ),
            StackError::UnknownLabel { index, label } => {
                write!(f, "instruction {} refers to unknown label {}", index, label)
            }
            StackError::BadDestination { index } => {
                write!(f, "instruction {} has no valid destination", index)
            }
            StackError::FallsOffEnd => write!(f, "execution runs past the last instruction"),
            StackError::MissingFinalReturn => write!(f, "node does not end with Return"),
        }
    }
}

impl std::error::Error for StackError {}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    /// Set a header, replacing an existing one with the same key.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|h| h.key == key) {
            Some(header) => header.value = value,
            None => self.headers.push(NodeHeader { key, value }),
        }
    }

    pub fn count(&self, opcode: OpCode) -> usize {
        self.instructions
            .iter()
            .filter(|i| i.opcode() == opcode)
            .count()
    }

    fn label_index(&self, at: usize, label: &str) -> Result<usize, StackError> {
        self.labels
            .get(label)
            .copied()
            .filter(|&i| i < self.instructions.len())
            .ok_or_else(|| StackError::UnknownLabel {
                index: at,
                label: label.to_string(),
            })
    }

    /// Number of values `instructions[index]` pops and pushes.
    fn stack_effect(&self, index: usize) -> (usize, usize) {
        match &self.instructions[index] {
            Instruction::JumpTo { .. }
            | Instruction::DetourToNode { .. }
            | Instruction::AddSaliencyCandidateFromNode { .. }
            | Instruction::Stop
            | Instruction::Return => (0, 0),
            Instruction::Jump | Instruction::Pop | Instruction::RunNode => (1, 0),
            // Peeking needs one value and leaves it.
            Instruction::PeekAndJump
            | Instruction::JumpIfFalse { .. }
            | Instruction::StoreVariable(_)
            | Instruction::PeekAndRunNode
            | Instruction::PeekAndDetourToNode => (1, 1),
            Instruction::RunLine { substitutions, .. }
            | Instruction::RunCommand { substitutions, .. } => (*substitutions, 0),
            Instruction::AddOption {
                substitutions,
                has_condition,
                ..
            } => (substitutions + usize::from(*has_condition), 0),
            Instruction::ShowOptions => (0, 1),
            Instruction::PushString(_)
            | Instruction::PushFloat(_)
            | Instruction::PushBool(_)
            | Instruction::PushVariable(_) => (0, 1),
            Instruction::CallFunc { .. } => {
                // The argument count is always pushed as a literal just before.
                let arguments = index
                    .checked_sub(1)
                    .and_then(|i| match self.instructions[i] {
                        Instruction::PushFloat(n) if n >= 0.0 => Some(n as usize),
                        _ => None,
                    })
                    .unwrap_or(0);
                (arguments + 1, 1)
            }
            // Modelled as destination plus flag on every path.
            Instruction::SelectSaliencyCandidate => (0, 2),
        }
    }

    fn successors(&self, index: usize) -> Result<Vec<usize>, StackError> {
        let next = index + 1;
        let instruction = &self.instructions[index];
        let targets = match instruction {
            Instruction::JumpTo { label } => vec![self.label_index(index, label)?],
            Instruction::JumpIfFalse { label } => vec![next, self.label_index(index, label)?],
            Instruction::Jump => {
                let mut targets = BTreeSet::new();
                for instruction in &self.instructions {
                    if let Instruction::AddOption { destination, .. } = instruction {
                        targets.insert(self.label_index(index, destination)?);
                    }
                }
                targets.into_iter().collect()
            }
            Instruction::PeekAndJump => {
                let mut targets = BTreeSet::new();
                for instruction in &self.instructions {
                    if let Instruction::AddSaliencyCandidateFromNode { destination, .. } =
                        instruction
                    {
                        match destination {
                            Some(d) if *d < self.instructions.len() => {
                                targets.insert(*d);
                            }
                            _ => return Err(StackError::BadDestination { index }),
                        }
                    }
                }
                targets.into_iter().collect()
            }
            other if other.is_terminal() => Vec::new(),
            _ => vec![next],
        };
        if targets.iter().any(|&t| t >= self.instructions.len()) {
            return Err(StackError::FallsOffEnd);
        }
        Ok(targets)
    }

    /// Check that every path through the node keeps the operand stack
    /// consistent and that the node ends with `Return`.
    pub fn verify_stack(&self) -> Result<(), StackError> {
        if !matches!(self.instructions.last(), Some(Instruction::Return)) {
            return Err(StackError::MissingFinalReturn);
        }
        let mut depths: HashMap<usize, usize> = HashMap::new();
        let mut work = vec![(0usize, 0usize)];
        while let Some((index, depth)) = work.pop() {
            match depths.get(&index) {
                Some(&seen) if seen == depth => continue,
                Some(&seen) => {
                    return Err(StackError::InconsistentDepth {
                        index,
                        expected: seen,
                        found: depth,
                    })
                }
                None => {
                    depths.insert(index, depth);
                }
            }
            let (pops, pushes) = self.stack_effect(index);
            let after = depth
                .checked_sub(pops)
                .ok_or(StackError::Underflow { index })?
                + pushes;
            for successor in self.successors(index)? {
                work.push((successor, after));
            }
        }
        Ok(())
    }
}

/// A compiled set of nodes plus the starting value of every stored variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub nodes: IndexMap<String, Node>,
    pub initial_values: IndexMap<String, Value>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn initial_value(&self, name: &str) -> Option<&Value> {
        self.initial_values.get(name)
    }

    /// Human-readable listing of every node.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for node in self.nodes.values() {
            let _ = writeln!(out, "Node {}:", node.name);
            let mut labels_at: HashMap<usize, Vec<&str>> = HashMap::new();
            for (label, index) in &node.labels {
                labels_at.entry(*index).or_default().push(label);
            }
            for (index, instruction) in node.instructions.iter().enumerate() {
                for label in labels_at.get(&index).into_iter().flatten() {
                    let _ = writeln!(out, "{}:", label);
                }
                if index % 5 == 0 {
                    let _ = writeln!(out, "{:>6}   {}", index, instruction);
                } else {
                    let _ = writeln!(out, "         {}", instruction);
                }
            }
            out.push('\n');
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}
