//! Script nodes.

use tracing::{debug, instrument};
use yarn_compiler_syntax::{HeaderValue, SourceFile, TAGS_HEADER};

use super::visitor::CodeGenerator;
use super::{Emitter, NodeBuilder};
use crate::cancel::CancellationToken;
use crate::debug_info::NodeDebugInfo;
use crate::error::CResult;
use crate::program::{Instruction, Node};
use crate::typecheck::TypeEnvironment;
use crate::types::{Operator, Type};

/// Compiled nodes of one file, in source order.
pub type FileOutput = Vec<(Node, NodeDebugInfo)>;

#[derive(Debug)]
struct FileCompiler {
    builder: NodeBuilder,
    /// Incremented whenever the node is left.
    tracking_variable: Option<String>,
}

impl Emitter for FileCompiler {
    fn builder(&mut self) -> &mut NodeBuilder {
        &mut self.builder
    }

    fn before_exit(&mut self) {
        let Some(variable) = self.tracking_variable.clone() else {
            return;
        };
        let add = Type::Number
            .operator_function(Operator::Add)
            .unwrap_or_else(|| format!("{}.{}", Type::Number, Operator::Add));
        for instruction in [
            Instruction::PushVariable(variable.clone()),
            Instruction::PushFloat(1.0),
            Instruction::PushFloat(2.0),
            Instruction::CallFunc { function: add },
            Instruction::StoreVariable(variable),
            Instruction::Pop,
        ] {
            self.builder.emit(instruction, None);
        }
    }
}

/// Compile every titled, non-empty node in `file`.
#[instrument(skip_all, fields(file = %file.name))]
pub fn compile_file(
    file: &SourceFile,
    env: &TypeEnvironment,
    cancel: &CancellationToken,
) -> CResult<FileOutput> {
    let mut output = Vec::with_capacity(file.nodes.len());
    for node in &file.nodes {
        cancel.check()?;
        let Some(title) = node.title() else {
            continue;
        };
        if node.is_empty() {
            continue;
        }

        let tracking_variable = crate::tracking_variable_name(title);
        let mut compiler = FileCompiler {
            builder: NodeBuilder::new(title, file.name.clone()),
            tracking_variable: env
                .declarations
                .contains(&tracking_variable)
                .then_some(tracking_variable),
        };

        {
            let compiled = compiler.builder.node_mut();
            for header in &node.headers {
                if let HeaderValue::Text(value) = &header.value {
                    compiled.set_header(header.key.clone(), value.clone());
                }
            }
            compiled.tags = node.tags().into_iter().map(str::to_string).collect();
            if !compiled.tags.is_empty() {
                compiled.set_header(TAGS_HEADER, compiled.tags.join(" "));
            }
            if let Some(variable) = &compiler.tracking_variable {
                compiled.set_header(crate::TRACKING_VARIABLE_HEADER, variable.clone());
            }
        }

        CodeGenerator::new(&mut compiler, env, &file.name).body(&node.body)?;
        compiler.before_exit();
        compiler.emit(Instruction::Return, None);

        let (compiled, debug_info) = compiler.builder.finish();
        debug!(
            node = %compiled.name,
            instructions = compiled.instructions.len(),
            "node emitted"
        );
        output.push((compiled, debug_info));
    }
    Ok(output)
}
