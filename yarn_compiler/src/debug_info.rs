//! Source positions for compiled instructions.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// File name recorded for nodes the compiler synthesizes.
pub const GENERATED_FILE: &str = "<generated>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed
    pub line: usize,
    /// 1-indexed
    pub column: usize,
}

/// Per-node map from instructions back to the script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeDebugInfo {
    pub file_name: String,
    pub node_name: String,
    /// Instruction index to source position. Synthesized instructions
    /// have no entry.
    pub positions: BTreeMap<usize, Position>,
    /// Label name to instruction index.
    pub labels: IndexMap<String, usize>,
}

impl NodeDebugInfo {
    pub fn new(file_name: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            node_name: node_name.into(),
            ..Self::default()
        }
    }

    pub fn position(&self, instruction: usize) -> Option<Position> {
        self.positions.get(&instruction).copied()
    }

    /// Labels bound to `instruction`.
    pub fn labels_at(&self, instruction: usize) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(move |(_, &i)| i == instruction)
            .map(|(label, _)| label.as_str())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
