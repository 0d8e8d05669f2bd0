//! Unification solver.
//!
//! Constraints arrive in batches (declarations first, then one batch per
//! file) and share one [`Substitution`]. Each constraint is tried on a
//! scratch copy of the substitution and committed only if it succeeds, so a
//! failure never leaves half a binding behind. Failed constraints, and the
//! not-yet-tried constraints of the same batch that share a type variable
//! with them, are set aside and retried one at a time once every batch has
//! been seen. Retrying stops when a round makes no progress, or when the
//! wall-clock limit runs out.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, instrument, trace, warn};

use super::constraint::{Constraint, ConstraintKind};
use super::substitution::Substitution;
use crate::config::CompilerConfig;
use crate::diagnostics::Diagnostic;
use crate::types::{KnownTypes, Type, TypeVar};

/// Check if solver debug logging is enabled via `YARN_SOLVER_DEBUG`.
#[cfg(debug_assertions)]
fn solver_debug_enabled() -> bool {
    use std::sync::OnceLock;
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("YARN_SOLVER_DEBUG").is_ok())
}

#[cfg(debug_assertions)]
fn solver_debug_log(args: std::fmt::Arguments<'_>) {
    if solver_debug_enabled() {
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), "{args}");
    }
}

#[cfg(not(debug_assertions))]
fn solver_debug_log(_args: std::fmt::Arguments<'_>) {}

/// Make `left` and `right` the same type, extending `substitution`.
///
/// Returns `false` on mismatch; `substitution` may then hold partial
/// bindings and should be discarded.
pub fn unify(left: &Type, right: &Type, substitution: &mut Substitution) -> bool {
    let left = substitution.chase(left);
    let right = substitution.chase(right);
    if left == right || left.is_wildcard() || right.is_wildcard() {
        return true;
    }
    match (&left, &right) {
        (Type::Variable(var), other) | (other, Type::Variable(var)) => {
            bind(*var, other, substitution)
        }
        (Type::Function(a), Type::Function(b)) => {
            if a.parameters.len() != b.parameters.len() {
                return false;
            }
            let variadic_ok = match (&a.variadic, &b.variadic) {
                (Some(x), Some(y)) => unify(x, y, substitution),
                (None, None) => true,
                _ => false,
            };
            variadic_ok
                && a
                    .parameters
                    .iter()
                    .zip(&b.parameters)
                    .all(|(x, y)| unify(x, y, substitution))
                && unify(&a.return_type, &b.return_type, substitution)
        }
        _ => false,
    }
}

fn bind(var: TypeVar, ty: &Type, substitution: &mut Substitution) -> bool {
    if substitution.occurs(var, ty) {
        trace!(var = %var, ty = %ty, "occurs check failed");
        return false;
    }
    trace!(var = %var, ty = %ty, "bind");
    substitution.bind(var, ty.clone());
    true
}

/// Attempt one constraint, mutating `substitution` in place.
fn attempt(constraint: &Constraint, known: &KnownTypes, substitution: &mut Substitution) -> bool {
    match &constraint.kind {
        ConstraintKind::Equal(left, right) => unify(left, right, substitution),
        ConstraintKind::HasMember { ty, member } => match substitution.chase(ty) {
            Type::Enum(e) => e.member(member).is_some(),
            Type::Variable(var) => {
                let candidates = known.enums_with_member(member);
                match candidates.as_slice() {
                    [only] => bind(var, &Type::Enum(only.clone()), substitution),
                    _ => false,
                }
            }
            other => other.is_wildcard(),
        },
    }
}

/// Try `constraint` against a scratch copy and commit on success.
fn attempt_transactional(
    constraint: &Constraint,
    known: &KnownTypes,
    substitution: &mut Substitution,
) -> bool {
    let mut scratch = substitution.clone();
    if attempt(constraint, known, &mut scratch) {
        *substitution = scratch;
        true
    } else {
        false
    }
}

/// Outcome of [`Solver::finish`].
#[derive(Debug, Default)]
pub struct SolveReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Retry rounds run by the individual retry loop.
    pub rounds: usize,
    /// Constraints abandoned because the time limit ran out.
    pub timed_out: usize,
    /// Type variables mentioned by constraints that were never solved.
    pub unresolved_variables: HashSet<TypeVar>,
}

impl SolveReport {
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Accumulates solutions across batches for one compilation job.
#[derive(Debug)]
pub struct Solver<'a> {
    known: &'a KnownTypes,
    config: &'a CompilerConfig,
    substitution: Substitution,
    failing: Vec<Constraint>,
}

impl<'a> Solver<'a> {
    pub fn new(known: &'a KnownTypes, config: &'a CompilerConfig) -> Self {
        Self {
            known,
            config,
            substitution: Substitution::new(),
            failing: Vec::new(),
        }
    }

    pub fn substitution(&self) -> &Substitution {
        &self.substitution
    }

    /// Constraints currently set aside for the retry loop.
    pub fn pending(&self) -> &[Constraint] {
        &self.failing
    }

    /// Solve one batch. Returns whether every constraint in it held.
    #[instrument(skip_all, fields(batch = name, constraints = constraints.len()))]
    pub fn solve_batch(&mut self, name: &str, constraints: Vec<Constraint>) -> bool {
        let mut tainted: Vec<TypeVar> = Vec::new();
        let mut all_solved = true;
        for constraint in constraints {
            solver_debug_log(format_args!("[{name}] {constraint}"));
            if constraint.mentions_any(&tainted) {
                tainted.extend(constraint.variables());
                self.failing.push(constraint);
                continue;
            }
            if !attempt_transactional(&constraint, self.known, &mut self.substitution) {
                trace!(constraint = %constraint, "set aside");
                all_solved = false;
                tainted.extend(constraint.variables());
                self.failing.push(constraint);
            }
        }
        debug!(
            bindings = self.substitution.len(),
            pending = self.failing.len(),
            "batch solved"
        );
        all_solved
    }

    /// Run the individual retry loop and report what still fails.
    #[instrument(skip_all, fields(pending = self.failing.len()))]
    pub fn finish(mut self) -> (Substitution, SolveReport) {
        let started = Instant::now();
        let mut report = SolveReport::default();
        let failing = std::mem::take(&mut self.failing);
        let mut pool = self.refresh(failing);

        while !pool.is_empty() {
            let limit_reached = started.elapsed() > self.config.solver_time_limit;
            if self.config.enforce_time_limit && limit_reached {
                warn!(
                    remaining = pool.len(),
                    limit_secs = self.config.solver_time_limit.as_secs_f64(),
                    "solver time limit exceeded"
                );
                let limit = self.config.solver_time_limit.as_secs_f64();
                report.timed_out = pool.len();
                report
                    .unresolved_variables
                    .extend(pool.iter().flat_map(Constraint::variables));
                report
                    .diagnostics
                    .extend(pool.drain(..).map(|c| c.timeout_diagnostic(limit)));
                break;
            }

            report.rounds += 1;
            let before = pool.len();
            let mut remaining = Vec::with_capacity(pool.len());
            for constraint in pool {
                if !attempt_transactional(&constraint, self.known, &mut self.substitution) {
                    remaining.push(constraint);
                }
            }
            pool = self.refresh(remaining);
            debug!(round = report.rounds, remaining = pool.len(), "retry round");
            if pool.len() == before {
                break;
            }
        }

        for constraint in &pool {
            report.unresolved_variables.extend(constraint.variables());
            solver_debug_log(format_args!("unsolved: {constraint}"));
            report
                .diagnostics
                .extend(constraint.failure_diagnostics(&self.substitution));
        }
        (self.substitution, report)
    }

    /// Apply the current substitution and drop constraints that now hold
    /// trivially.
    fn refresh(&self, pool: Vec<Constraint>) -> Vec<Constraint> {
        pool.into_iter()
            .map(|c| c.apply(&self.substitution))
            .filter(|c| !c.is_tautology())
            .collect()
    }
}
