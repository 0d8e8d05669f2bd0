//! The string table: every line and option the job can deliver.
//!
//! Lines without a `#line:` tag are given an implicit one here, before type
//! checking, so that code generation can rely on every line having an ID.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use yarn_compiler_syntax::{Line, SourceFile, Statement, StatementKind};

use crate::diagnostics::Diagnostics;

/// Prefix of every line ID.
pub const LINE_ID_PREFIX: &str = "line:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringInfo {
    /// Text with `{0}`, `{1}`, ... in place of inline expressions.
    pub text: String,
    pub file_name: String,
    pub node_name: Option<String>,
    pub line_number: usize,
    /// Whether the ID was generated rather than written in the script.
    pub is_implicit_tag: bool,
    /// Hashtags on the line other than its ID.
    pub metadata: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StringTable {
    entries: IndexMap<String, StringInfo>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&StringInfo> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Add an entry. Returns `false`, leaving the table unchanged, when the ID
    /// is already present.
    pub fn insert(&mut self, id: impl Into<String>, info: StringInfo) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, info);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StringInfo)> {
        self.entries.iter().map(|(id, info)| (id.as_str(), info))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// The ID a line is delivered under, including the `line:` prefix.
pub fn line_id(line: &Line) -> Option<String> {
    line.line_id().map(|id| format!("{}{}", LINE_ID_PREFIX, id))
}

fn for_each_line_mut(body: &mut [Statement], f: &mut dyn FnMut(&mut Line)) {
    for statement in body {
        match &mut statement.kind {
            StatementKind::Line(line) => f(line),
            StatementKind::Options(options) => {
                for option in options {
                    f(&mut option.line);
                    for_each_line_mut(&mut option.body, f);
                }
            }
            StatementKind::If(clauses) => {
                for clause in clauses {
                    for_each_line_mut(&mut clause.body, f);
                }
            }
            StatementKind::Once(block) => {
                for_each_line_mut(&mut block.body, f);
                for_each_line_mut(&mut block.else_body, f);
            }
            _ => {}
        }
    }
}

/// Register every line in `files`, tagging lines that have no ID.
///
/// Returns the table and whether any implicit ID was generated.
pub fn register_strings(
    files: &mut [SourceFile],
    diagnostics: &mut Diagnostics,
) -> (StringTable, bool) {
    let mut table = StringTable::new();
    let mut any_implicit = false;

    for file in files.iter_mut() {
        let file_name = file.name.clone();
        let stem = file.stem().to_string();
        for node in &mut file.nodes {
            let node_name = node.title().map(str::to_string);
            let mut counter = 0usize;
            for_each_line_mut(&mut node.body, &mut |line| {
                let mut is_implicit = false;
                if line.line_id().is_none() {
                    let implicit = format!(
                        "{}{}-{}-{}",
                        LINE_ID_PREFIX,
                        stem,
                        node_name.as_deref().unwrap_or(""),
                        counter
                    );
                    counter += 1;
                    line.tags.push(implicit);
                    is_implicit = true;
                }
                let Some(id) = line_id(line) else {
                    return;
                };
                let info = StringInfo {
                    text: line.text(),
                    file_name: file_name.clone(),
                    node_name: node_name.clone(),
                    line_number: line.span.start_line,
                    is_implicit_tag: is_implicit,
                    metadata: line.metadata_tags(),
                };
                if !table.insert(id.clone(), info) {
                    diagnostics.error(
                        file_name.clone(),
                        line.span,
                        format!("Duplicate line ID {}", id),
                    );
                }
                any_implicit |= is_implicit;
            });
        }
    }

    debug!(strings = table.len(), implicit = any_implicit, "strings registered");
    (table, any_implicit)
}
