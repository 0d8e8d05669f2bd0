//! Smart variables compile to nodes the runtime evaluates on every read.

use super::visitor::CodeGenerator;
use super::{Emitter, NodeBuilder};
use crate::debug_info::{NodeDebugInfo, GENERATED_FILE};
use crate::declaration::Declaration;
use crate::error::{internal, CResult};
use crate::program::{Instruction, Node};
use crate::typecheck::TypeEnvironment;

#[derive(Debug)]
struct SmartVariableCompiler {
    builder: NodeBuilder,
}

impl Emitter for SmartVariableCompiler {
    fn builder(&mut self) -> &mut NodeBuilder {
        &mut self.builder
    }
}

/// Compile `declaration` into a node named after the variable.
pub fn compile_smart_variable(
    declaration: &Declaration,
    env: &TypeEnvironment,
) -> CResult<(Node, NodeDebugInfo)> {
    let Some(expression) = &declaration.initial_value_expression else {
        return internal(format!(
            "smart variable {} has no expression",
            declaration.name
        ));
    };
    let file = declaration.source_file.as_deref().unwrap_or(GENERATED_FILE);
    let mut compiler = SmartVariableCompiler {
        builder: NodeBuilder::new(declaration.name.clone(), file),
    };
    compiler
        .builder
        .node_mut()
        .tags
        .push(crate::SMART_VARIABLE_TAG.to_string());

    CodeGenerator::new(&mut compiler, env, file).expression(expression)?;
    compiler.emit(Instruction::Return, None);
    Ok(compiler.builder.finish())
}
