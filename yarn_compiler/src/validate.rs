//! Node-level checks that run before type checking.
//!
//! Also finds node groups: every node sharing a title with a node that has
//! `when` headers. Members are retitled `{group}.{n}` so each one compiles
//! to its own node, and the group's title is left for the hub.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use yarn_compiler_syntax::{Header, SourceFile};

use crate::diagnostics::Diagnostics;

static ILLEGAL_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\[<>\]{}\|:\s#\$]").unwrap_or_else(|e| panic!("invalid title pattern: {e}"))
});

/// A node group found in a job.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGroup {
    pub name: String,
    /// File of the first member.
    pub file: String,
    /// `(file index, node index)` of each member, in job order.
    pub members: Vec<(usize, usize)>,
}

/// Check titles and bodies, and retitle node-group members.
pub fn validate_nodes(files: &mut [SourceFile], diagnostics: &mut Diagnostics) -> Vec<NodeGroup> {
    // title -> (file, node, has when headers)
    let mut by_title: IndexMap<String, Vec<(usize, usize, bool)>> = IndexMap::new();

    for (file_index, file) in files.iter().enumerate() {
        for (node_index, node) in file.nodes.iter().enumerate() {
            let Some(title) = node.title() else {
                diagnostics.warning(
                    file.name.clone(),
                    node.span,
                    "Node has no title and will not be included in the compiled output.",
                );
                continue;
            };
            if ILLEGAL_TITLE.is_match(title) {
                diagnostics.error(
                    file.name.clone(),
                    node.title_span(),
                    format!("The node '{}' contains illegal characters.", title),
                );
            }
            if node.is_empty() {
                diagnostics.warning(
                    file.name.clone(),
                    node.title_span(),
                    format!(
                        "Node \"{}\" is empty and will not be included in the compiled output.",
                        title
                    ),
                );
            }
            by_title.entry(title.to_string()).or_default().push((
                file_index,
                node_index,
                node.has_when_clauses(),
            ));
        }
    }

    let mut groups = Vec::new();
    for (title, nodes) in by_title {
        let with_when = nodes.iter().filter(|(_, _, when)| *when).count();
        if with_when == 0 {
            for &(f, n, _) in nodes.iter().skip(1) {
                let file = &files[f];
                diagnostics.error(
                    file.name.clone(),
                    file.nodes[n].title_span(),
                    format!("More than one node is named {}", title),
                );
            }
            continue;
        }
        if with_when != nodes.len() {
            for &(f, n, _) in nodes.iter().filter(|(_, _, when)| !*when) {
                let file = &files[f];
                diagnostics.error(
                    file.name.clone(),
                    file.nodes[n].title_span(),
                    format!(
                        "All nodes in the group '{}' must have a 'when' clause (use 'when: always' if you want them to run when no other nodes can run)",
                        title
                    ),
                );
            }
            continue;
        }

        let members: Vec<(usize, usize)> = nodes.iter().map(|&(f, n, _)| (f, n)).collect();
        for (index, &(f, n)) in members.iter().enumerate() {
            let node = &mut files[f].nodes[n];
            node.set_title(format!("{}.{}", title, index));
            node.headers
                .push(Header::text(crate::NODE_GROUP_HEADER, title.clone()));
        }
        groups.push(NodeGroup {
            file: files[members[0].0].name.clone(),
            name: title,
            members,
        });
    }

    debug!(groups = groups.len(), "nodes validated");
    groups
}
