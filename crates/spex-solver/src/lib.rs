// SPDX-License-Identifier: AGPL-3.0

//! Solver adapter for path exploration.
//!
//! Wraps one incremental `z3::Solver` per execution path. Incremental checks
//! occasionally come back *unknown* because stack operations change how the
//! solver compiles formulas; `check_assuming_isolated` retries such checks on
//! a fresh solver instance seeded with the same assertions.

use spex_exceptions::SpexException;
use z3::ast::{Ast, Bool};
use z3::{Context, Goal, Model, Params, SatResult, Solver, Tactic};

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Sat,
    Unsat,
    Unknown { reason: String },
}

impl CheckOutcome {
    fn from_solver(result: SatResult, solver: &Solver) -> Self {
        match result {
            SatResult::Sat => CheckOutcome::Sat,
            SatResult::Unsat => CheckOutcome::Unsat,
            SatResult::Unknown => CheckOutcome::Unknown {
                reason: solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string()),
            },
        }
    }

    pub fn is_sat(&self) -> bool {
        matches!(self, CheckOutcome::Sat)
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, CheckOutcome::Unsat)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CheckOutcome::Unknown { .. })
    }

    /// The solver's reason string for an *unknown* outcome.
    pub fn reason(&self) -> &str {
        match self {
            CheckOutcome::Unknown { reason } => reason,
            CheckOutcome::Sat => "sat",
            CheckOutcome::Unsat => "unsat",
        }
    }
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::Sat => write!(f, "sat"),
            CheckOutcome::Unsat => write!(f, "unsat"),
            CheckOutcome::Unknown { reason } => write!(f, "unknown ({})", reason),
        }
    }
}

/// The per-path incremental solver.
///
/// One `PathSolver` is created for every schedule popped from the queue and
/// dropped when the path completes. Solvers are never shared across paths.
pub struct PathSolver<'ctx> {
    ctx: &'ctx Context,
    solver: Solver<'ctx>,
    timeout_ms: Option<u32>,
}

impl<'ctx> PathSolver<'ctx> {
    pub fn new(ctx: &'ctx Context, timeout_ms: Option<u32>) -> Self {
        let solver = Solver::new(ctx);
        if let Some(ms) = timeout_ms {
            let mut params = Params::new(ctx);
            params.set_u32("timeout", ms);
            solver.set_params(&params);
        }
        Self {
            ctx,
            solver,
            timeout_ms,
        }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn push(&self) {
        self.solver.push();
    }

    pub fn pop(&self) {
        self.solver.pop(1);
    }

    /// Assert a condition on the current path.
    pub fn assert(&self, cond: &Bool<'ctx>) {
        self.solver.assert(cond);
    }

    /// All conditions asserted so far.
    pub fn assertions(&self) -> Vec<Bool<'ctx>> {
        self.solver.get_assertions()
    }

    /// Check the current assertion set.
    pub fn check(&self) -> CheckOutcome {
        CheckOutcome::from_solver(self.solver.check(), &self.solver)
    }

    /// Check the current assertion set, retrying *unknown* on a fresh solver.
    pub fn check_isolated(&self) -> CheckOutcome {
        let outcome = self.check();
        if outcome.is_unknown() {
            return self.isolated_check(None);
        }
        outcome
    }

    /// Check whether `cond` is consistent with the current assertions.
    ///
    /// Incremental push/assert/check/pop, no retry. Used where a spurious
    /// *unknown* is harmless (e.g. the implied-assumption test).
    pub fn check_assuming(&self, cond: &Bool<'ctx>) -> CheckOutcome {
        self.solver.push();
        self.solver.assert(cond);
        let outcome = CheckOutcome::from_solver(self.solver.check(), &self.solver);
        self.solver.pop(1);
        outcome
    }

    /// Check whether `cond` is consistent with the current assertions,
    /// retrying an *unknown* incremental answer on an isolated solver.
    pub fn check_assuming_isolated(&self, cond: &Bool<'ctx>) -> CheckOutcome {
        let outcome = self.check_assuming(cond);
        if outcome.is_unknown() {
            return self.isolated_check(Some(cond));
        }
        outcome
    }

    /// A model for the current assertion set, if one is available.
    pub fn model(&self) -> Option<Model<'ctx>> {
        self.solver.get_model()
    }

    /// Fresh solver instance containing the same assertions (plus `extra`).
    fn isolated_check(&self, extra: Option<&Bool<'ctx>>) -> CheckOutcome {
        let fresh = Solver::new(self.ctx);
        if let Some(ms) = self.timeout_ms {
            let mut params = Params::new(self.ctx);
            params.set_u32("timeout", ms);
            fresh.set_params(&params);
        }
        for assertion in self.solver.get_assertions() {
            fresh.assert(&assertion);
        }
        if let Some(cond) = extra {
            fresh.assert(cond);
        }
        CheckOutcome::from_solver(fresh.check(), &fresh)
    }

    /// The current path constraint as a string, or `None` if the path is
    /// unconstrained.
    pub fn path_state_str(&self) -> Option<String> {
        let asserts = self.solver.get_assertions();
        if asserts.is_empty() {
            return None;
        }
        let refs: Vec<&Bool<'ctx>> = asserts.iter().collect();
        let conj = Bool::and(self.ctx, &refs);
        Some(conj.simplify().to_string())
    }
}

impl<'ctx> std::fmt::Debug for PathSolver<'ctx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PathSolver({} assertions)", self.assertions().len())
    }
}

/// One-shot check of a standalone formula on a fresh solver.
///
/// Returns the outcome and, when satisfiable, a model.
pub fn check_formula<'ctx>(
    ctx: &'ctx Context,
    formula: &Bool<'ctx>,
) -> (CheckOutcome, Option<Model<'ctx>>) {
    let solver = Solver::new(ctx);
    solver.assert(formula);
    let outcome = CheckOutcome::from_solver(solver.check(), &solver);
    let model = if outcome.is_sat() {
        solver.get_model()
    } else {
        None
    };
    (outcome, model)
}

/// Simplify a boolean term with a tactic chain.
///
/// The default chain runs `simplify` (with select/store expansion),
/// `propagate-values` and `ctx-simplify` to a fixpoint. `try_harder` swaps in
/// `ctx-solver-simplify`, which is much slower but stronger.
pub fn simplify<'ctx>(ctx: &'ctx Context, expr: &Bool<'ctx>, try_harder: bool) -> Bool<'ctx> {
    let core_simplifier = if try_harder {
        "ctx-solver-simplify"
    } else {
        "ctx-simplify"
    };

    let chain = Tactic::new(ctx, "simplify")
        .and_then(&Tactic::new(ctx, "propagate-values"))
        .and_then(&Tactic::new(ctx, "ctx-simplify"))
        .and_then(&Tactic::new(ctx, core_simplifier));
    let tactic = Tactic::repeat(ctx, &chain, 8);

    let mut params = Params::new(ctx);
    params.set_bool("expand_select_store", true);
    params.set_bool("ite_extra_rules", true);
    params.set_bool("expand_store_eq", true);

    let goal = Goal::new(ctx, false, false, false);
    goal.assert(expr);

    let result = match tactic.apply(&goal, Some(&params)) {
        Ok(result) => result,
        Err(_) => return expr.simplify(),
    };

    let mut formulas: Vec<Bool<'ctx>> = Vec::new();
    for subgoal in result.list_subgoals() {
        formulas.extend(subgoal.get_formulas::<Bool<'ctx>>());
    }

    if formulas.is_empty() {
        return Bool::from_bool(ctx, true);
    }
    let refs: Vec<&Bool<'ctx>> = formulas.iter().collect();
    Bool::and(ctx, &refs).simplify()
}

/// Convert an *unknown* check outcome into the uncheckable-constraint error.
pub fn uncheckable<'ctx>(expr: &Bool<'ctx>, outcome: &CheckOutcome) -> SpexException {
    SpexException::UncheckableConstraint {
        expr: expr.simplify().to_string(),
        reason: outcome.reason().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::Int;
    use z3::Config;

    #[test]
    fn test_check_outcomes() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = PathSolver::new(&ctx, None);

        let x = Int::new_const(&ctx, "x");
        let five = Int::from_i64(&ctx, 5);
        solver.assert(&x._eq(&five));

        assert!(solver.check().is_sat());

        let ten = Int::from_i64(&ctx, 10);
        assert!(solver.check_assuming(&x._eq(&ten)).is_unsat());
        assert!(solver.check_assuming_isolated(&x._eq(&five)).is_sat());

        // The probe must not have left anything on the solver
        assert_eq!(solver.assertions().len(), 1);
    }

    #[test]
    fn test_path_state_str() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let solver = PathSolver::new(&ctx, None);

        assert!(solver.path_state_str().is_none());

        let x = Int::new_const(&ctx, "x");
        solver.assert(&x.gt(&Int::from_i64(&ctx, 0)));
        let state = solver.path_state_str().unwrap();
        assert!(state.contains("x"));
    }

    #[test]
    fn test_check_formula_produces_model() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x = Int::new_const(&ctx, "x");
        let formula = x._eq(&Int::from_i64(&ctx, 3));
        let (outcome, model) = check_formula(&ctx, &formula);
        assert!(outcome.is_sat());

        let model = model.unwrap();
        let value = model.eval(&x, true).unwrap();
        assert_eq!(value.as_i64().unwrap(), 3);
    }

    #[test]
    fn test_check_formula_unsat() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x = Int::new_const(&ctx, "x");
        let formula = Bool::and(
            &ctx,
            &[
                &x._eq(&Int::from_i64(&ctx, 3)),
                &x._eq(&Int::from_i64(&ctx, 4)),
            ],
        );
        let (outcome, model) = check_formula(&ctx, &formula);
        assert!(outcome.is_unsat());
        assert!(model.is_none());
    }

    #[test]
    fn test_simplify_tautology() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x = Int::new_const(&ctx, "x");
        let tauto = x._eq(&x);
        let simplified = simplify(&ctx, &tauto, false);
        assert_eq!(simplified.as_bool(), Some(true));
    }

    #[test]
    fn test_simplify_try_harder() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);

        let x = Int::new_const(&ctx, "x");
        let gt = x.gt(&Int::from_i64(&ctx, 0));
        let redundant = Bool::and(&ctx, &[&gt, &gt]);
        let simplified = simplify(&ctx, &redundant, true);

        // Whatever shape comes back must stay equivalent to the input
        let differs = simplified.iff(&redundant).not();
        let (outcome, _) = check_formula(&ctx, &differs);
        assert!(outcome.is_unsat());
    }

    #[test]
    fn test_uncheckable_error() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let x = Int::new_const(&ctx, "x");
        let cond = x.gt(&Int::from_i64(&ctx, 0));
        let outcome = CheckOutcome::Unknown {
            reason: "canceled".to_string(),
        };
        let err = uncheckable(&cond, &outcome);
        assert!(err.to_string().contains("canceled"));
        assert!(err.ends_path_only());
    }
}
