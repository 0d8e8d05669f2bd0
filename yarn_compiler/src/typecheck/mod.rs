//! Type checking.
//!
//! # Module Organization
//!
//! - `collect`: enum definitions and `declare` statements, across all files
//! - `generate`: per-file constraint generation
//! - `constraint`: type equations and their failure messages
//! - `substitution`: type-variable bindings
//! - `solver`: unification, batch solving and the retry loop
//! - `apply`: writes solved types back onto declarations and expressions
//!
//! Expression types live in a side table keyed by [`ExprId`]; the trees
//! themselves are never annotated.

mod apply;
mod collect;
pub mod constraint;
mod generate;
pub mod solver;
pub mod substitution;

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, instrument};
use yarn_compiler_syntax::{ExprId, Expression, SourceFile, Span};

use crate::cancel::CancellationToken;
use crate::config::CompilerConfig;
use crate::declaration::DeclarationTable;
use crate::diagnostics::Diagnostics;
use crate::error::CResult;
use crate::types::{KnownTypes, Operator, Type, TypeVarSupply};

pub use apply::constant_value;
pub use constraint::{Constraint, ConstraintKind, FailureMessage};
pub use solver::{unify, SolveReport, Solver};
pub use substitution::Substitution;

/// Resolved type of every expression in a job.
pub type ExpressionTypes = HashMap<ExprId, Type>;

/// Where an expression appears.
#[derive(Debug, Clone)]
pub struct ExprSite {
    pub file: String,
    pub span: Span,
}

/// A use of an operator whose support can only be checked once the operand
/// type is known.
#[derive(Debug, Clone)]
pub struct OperatorUse {
    pub op: Operator,
    pub symbol: &'static str,
    pub operand: Type,
    pub file: String,
    pub span: Span,
}

/// Everything type checking learns about a job.
#[derive(Debug, Default)]
pub struct TypeEnvironment {
    pub declarations: DeclarationTable,
    pub known: KnownTypes,
    pub supply: TypeVarSupply,
    pub types: ExpressionTypes,
    pub sites: HashMap<ExprId, ExprSite>,
    pub operators: Vec<OperatorUse>,
    /// Nodes whose visits scripts query with `visited`/`visited_count`.
    pub tracked_nodes: BTreeSet<String>,
    /// First constant assigned to each implicitly declared variable.
    pub implicit_defaults: HashMap<String, Expression>,
}

impl TypeEnvironment {
    pub fn new(declarations: DeclarationTable, known: KnownTypes) -> Self {
        Self {
            declarations,
            known,
            ..Self::default()
        }
    }

    pub fn type_of(&self, expr: &Expression) -> Option<&Type> {
        self.types.get(&expr.id)
    }
}

/// Infer and check types for `files`, updating `env` in place.
#[instrument(skip_all, fields(files = files.len()))]
pub fn check(
    files: &[SourceFile],
    env: &mut TypeEnvironment,
    config: &CompilerConfig,
    cancel: &CancellationToken,
    diagnostics: &mut Diagnostics,
) -> CResult<()> {
    let mut batches = Vec::with_capacity(files.len() + 1);
    let declaration_batch = collect::collect_declarations(files, env, diagnostics, cancel)?;
    debug!(
        declarations = env.declarations.len(),
        constraints = declaration_batch.len(),
        "declarations collected"
    );
    batches.push(("declarations".to_string(), declaration_batch));

    for file in files {
        cancel.check()?;
        let constraints = generate::generate_file(file, env, diagnostics);
        debug!(file = %file.name, constraints = constraints.len(), "constraints generated");
        batches.push((file.name.clone(), constraints));
    }

    let (substitution, report) = {
        let mut solver = Solver::new(&env.known, config);
        for (name, batch) in batches {
            solver.solve_batch(&name, batch);
        }
        solver.finish()
    };
    debug!(
        rounds = report.rounds,
        failures = report.diagnostics.len(),
        "constraints solved"
    );
    let unresolved = report.unresolved_variables.clone();
    diagnostics.extend(report.diagnostics);

    apply::apply_substitution(env, &substitution, &unresolved, diagnostics, cancel)
}
