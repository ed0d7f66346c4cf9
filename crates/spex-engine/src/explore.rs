// SPDX-License-Identifier: AGPL-3.0

//! The path-exploration scheduler.
//!
//! [`explore`] turns a closure over symbolic inputs into an iterator of
//! per-path results. The closure runs once per schedule popped from the
//! pending stack; every [`Exec::branch`] call either replays a recorded
//! choice or extends the schedule, pushing the opposite direction when it is
//! also feasible. A fresh solver is created for every path; replay
//! re-asserts the recorded choices into it, so a path's constraint state is
//! reproduced deterministically.

use spex_exceptions::{SpexException, SpexResult};
use spex_graph::{ExploreGraph, NodeColor};
use spex_solver::{uncheckable, PathSolver};
use spex_value::{
    const_map as make_const_map, declare_assumptions, AssumeHost, Compound, Sort, SortCache,
    SpexBool, SpexValue,
};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use z3::Context;

use crate::model::{build_compound, ConstType, ExploreResult, VarCtor};
use crate::schedule::{Choice, SchedEntry, Schedule};

/// Exactly one exploration may be active process-wide.
static EXPLORATION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Knobs for one exploration.
#[derive(Debug, Clone, Default)]
pub struct ExploreOptions {
    /// Per-check solver timeout in milliseconds. Checks that time out come
    /// back as *unknown* and follow the uncheckable-constraint route.
    pub solver_timeout_ms: Option<u32>,
}

/// Evaluate `func` under symbolic execution with default options.
///
/// Returns an iterator yielding one [`ExploreResult`] per distinct feasible
/// path.
pub fn explore<'ctx, R, F>(ctx: &'ctx Context, func: F) -> SpexResult<Explorer<'ctx, R, F>>
where
    F: for<'env> FnMut(&mut Exec<'env, 'ctx>) -> SpexResult<R>,
{
    Explorer::new(ctx, ExploreOptions::default(), func)
}

/// The exploration iterator. Dropping it releases all scheduler state, so a
/// caller may stop after any number of paths.
pub struct Explorer<'ctx, R, F>
where
    F: for<'env> FnMut(&mut Exec<'env, 'ctx>) -> SpexResult<R>,
{
    func: F,
    options: ExploreOptions,
    /// Schedules not yet executed; forks push the alternative here.
    pending: Vec<Schedule>,
    /// Paths run so far, feasible or not. Used to stamp diagnostics.
    explored: usize,
    /// Paths that ran to completion and were yielded.
    completed: usize,
    graph: ExploreGraph,
    sorts: Rc<SortCache<'ctx>>,
    ctors: HashMap<String, VarCtor<'ctx>>,
    done: bool,
}

impl<'ctx, R, F> Explorer<'ctx, R, F>
where
    F: for<'env> FnMut(&mut Exec<'env, 'ctx>) -> SpexResult<R>,
{
    pub fn new(ctx: &'ctx Context, options: ExploreOptions, func: F) -> SpexResult<Self> {
        if EXPLORATION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SpexException::RecursiveExploration);
        }

        let mut graph = ExploreGraph::new();
        // Prime the stack with a root entry; it is skipped during replay but
        // means the last schedule entry always carries a graph node.
        let root = graph.new_node();

        Ok(Self {
            func,
            options,
            pending: vec![vec![SchedEntry::assume(root)]],
            explored: 0,
            completed: 0,
            graph,
            sorts: Rc::new(SortCache::new(ctx)),
            ctors: HashMap::new(),
            done: false,
        })
    }

    /// The exploration graph recorded so far.
    pub fn graph(&self) -> &ExploreGraph {
        &self.graph
    }

    /// Paths completed so far.
    pub fn completed_paths(&self) -> usize {
        self.completed
    }
}

impl<'ctx, R, F> Iterator for Explorer<'ctx, R, F>
where
    R: std::fmt::Debug,
    F: for<'env> FnMut(&mut Exec<'env, 'ctx>) -> SpexResult<R>,
{
    type Item = SpexResult<ExploreResult<'ctx, R>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(sched) = self.pending.pop() {
            self.explored += 1;
            let solver = PathSolver::new(self.sorts.ctx(), self.options.solver_timeout_ms);
            let mut exec = Exec {
                solver,
                sched,
                schedidx: 1,
                pending: &mut self.pending,
                graph: &mut self.graph,
                ctors: &mut self.ctors,
                const_types: HashMap::new(),
                sorts: Rc::clone(&self.sorts),
                anon: 0,
            };

            let outcome = (self.func)(&mut exec);

            let Exec {
                solver,
                sched,
                const_types,
                ..
            } = exec;
            let terminal = sched.last().expect("schedule has a root entry").node;

            match outcome {
                Ok(value) => {
                    self.graph.set_label(terminal, &format!("{:?}", value));
                    self.completed += 1;
                    return Some(Ok(ExploreResult {
                        value,
                        conditions: solver.assertions(),
                        ctors: self.ctors.clone(),
                        const_types,
                        sorts: Rc::clone(&self.sorts),
                    }));
                }
                Err(SpexException::UnsatisfiablePath) => {
                    self.graph.set_label(terminal, "Unsatisfiable path");
                    self.graph.set_color(terminal, NodeColor::Blue);
                }
                Err(err @ SpexException::UncheckableConstraint { .. }) => {
                    self.graph.set_label(terminal, &format!("Exception: {}", err));
                    self.graph.set_color(terminal, NodeColor::Red);
                    spex_logs::warn_path(
                        spex_logs::ErrorCode::UncheckableConstraint,
                        self.explored,
                        &format!("abandoning path: {}", err),
                    );
                }
                Err(err) => {
                    self.graph.set_label(terminal, &format!("Exception: {}", err));
                    self.graph.set_color(terminal, NodeColor::Red);
                    self.pending.clear();
                    self.done = true;
                    return Some(Err(err.in_symbolic_state(solver.path_state_str())));
                }
            }
        }

        self.done = true;
        None
    }
}

impl<'ctx, R, F> Drop for Explorer<'ctx, R, F>
where
    F: for<'env> FnMut(&mut Exec<'env, 'ctx>) -> SpexResult<R>,
{
    fn drop(&mut self) {
        self.pending.clear();
        EXPLORATION_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// The per-path execution context handed to the function under exploration.
///
/// All symbolic inputs, branches and assumptions of the function go through
/// this context. It owns the path's solver and its position in the current
/// schedule, and borrows the exploration-wide pending stack, graph and
/// constructor map.
pub struct Exec<'env, 'ctx> {
    solver: PathSolver<'ctx>,
    sched: Schedule,
    schedidx: usize,
    pending: &'env mut Vec<Schedule>,
    graph: &'env mut ExploreGraph,
    ctors: &'env mut HashMap<String, VarCtor<'ctx>>,
    const_types: HashMap<String, ConstType>,
    sorts: Rc<SortCache<'ctx>>,
    anon: usize,
}

impl<'env, 'ctx> Exec<'env, 'ctx> {
    pub fn ctx(&self) -> &'ctx Context {
        self.sorts.ctx()
    }

    /// The conditions asserted on this path so far.
    pub fn path_condition_list(&self) -> Vec<SpexBool<'ctx>> {
        self.solver
            .assertions()
            .into_iter()
            .map(SpexBool::from_z3)
            .collect()
    }

    fn anon_name(&mut self) -> String {
        self.anon += 1;
        format!("anon{}", self.anon)
    }

    fn last_node(&self) -> petgraph::graph::NodeIndex {
        self.sched.last().expect("schedule has a root entry").node
    }

    /// A fresh symbolic variable of the given sort.
    ///
    /// Supplying a name registers the variable for model projection;
    /// anonymous variables get a per-path monotonic name. Calling this twice
    /// with the same name yields the same underlying symbolic value.
    pub fn var(&mut self, sort: &Sort, name: Option<&str>) -> SpexResult<SpexValue<'ctx>> {
        let name = match name {
            Some(given) => {
                self.ctors.insert(
                    given.to_string(),
                    VarCtor {
                        sort: sort.clone(),
                        overrides: Vec::new(),
                    },
                );
                given.to_string()
            }
            None => self.anon_name(),
        };
        let value = self.build_value(sort, &name, &[])?;
        declare_assumptions(self.ctx(), &value, self)?;
        Ok(value)
    }

    /// A fresh struct with some fields supplied explicitly.
    ///
    /// Omitted fields become fresh symbolic constants named under `name`.
    /// Supplied fields are snapshotted at this point, both into the value
    /// and into the constructor recorded for model projection.
    pub fn var_struct(
        &mut self,
        sort: &Sort,
        name: &str,
        fields: Vec<(&str, &SpexValue<'ctx>)>,
    ) -> SpexResult<SpexValue<'ctx>> {
        let declared = match sort.resolve() {
            Sort::Struct { fields } => fields.clone(),
            other => {
                return Err(SpexException::TypeMismatch(format!(
                    "{} is not a struct sort",
                    other
                )))
            }
        };
        let mut overrides: Vec<(String, Compound<'ctx>)> = Vec::new();
        for (field, value) in fields {
            let field_sort = declared
                .iter()
                .find(|(declared_name, _)| declared_name == field)
                .map(|(_, field_sort)| field_sort)
                .ok_or_else(|| {
                    SpexException::TypeMismatch(format!("unknown struct field {}", field))
                })?;
            if field_sort.resolve() != value.sort().resolve() {
                return Err(SpexException::TypeMismatch(format!(
                    "cannot initialize field {} of sort {} with {}",
                    field,
                    field_sort,
                    value.sort()
                )));
            }
            overrides.push((field.to_string(), value.to_compound(self.ctx())?));
        }

        self.ctors.insert(
            name.to_string(),
            VarCtor {
                sort: sort.clone(),
                overrides: overrides.clone(),
            },
        );
        let value = self.build_value(sort, name, &overrides)?;
        declare_assumptions(self.ctx(), &value, self)?;
        Ok(value)
    }

    /// The constant of an enumeration variant.
    pub fn enum_value(&self, sort: &Sort, variant: &str) -> SpexResult<SpexValue<'ctx>> {
        let term = self.sorts.enum_variant(sort, variant)?;
        SpexValue::wrap_leaf(sort, term)
    }

    /// A map (or const-map) where every key initially maps to `value`.
    pub fn const_map(
        &mut self,
        sort: &Sort,
        value: &SpexValue<'ctx>,
    ) -> SpexResult<SpexValue<'ctx>> {
        let map = make_const_map(self.sorts.as_ref(), sort, value)?;
        declare_assumptions(self.ctx(), &map, self)?;
        Ok(map)
    }

    /// Build the value tree of fresh constants, recording each created
    /// constant in the type side table. Does not run the assumption
    /// protocol; `var`/`var_struct` do that, quantifier binders must not.
    fn build_value(
        &mut self,
        sort: &Sort,
        name: &str,
        overrides: &[(String, Compound<'ctx>)],
    ) -> SpexResult<SpexValue<'ctx>> {
        let sorts = Rc::clone(&self.sorts);
        let const_types = &mut self.const_types;
        let outer = sort.clone();
        let compound = build_compound(
            sorts.as_ref(),
            sort,
            name,
            overrides,
            &mut |leaf_name, path| {
                const_types.insert(
                    leaf_name,
                    ConstType {
                        outer: outer.clone(),
                        path,
                    },
                );
            },
        );

        if sort.is_mutable() {
            SpexValue::wrap_lvalue(sort, spex_value::Lvalue::new_root(compound))
        } else {
            SpexValue::wrap_leaf(sort, compound.leaf()?.clone())
        }
    }

    /// Coerce a symbolic boolean to a branch decision.
    ///
    /// Constant booleans never fork. A symbolic boolean consults the
    /// schedule: during replay the recorded choice is followed; at the end
    /// of the schedule both directions are checked and, when the alternative
    /// is also feasible, a clone of the schedule taking it is pushed onto
    /// the pending stack.
    pub fn branch(&mut self, cond: &SpexBool<'ctx>) -> SpexResult<bool> {
        if let SpexBool::Concrete(decided) = cond {
            return Ok(*decided);
        }
        let term = cond.as_z3(self.ctx());
        let negated = term.not();

        if self.schedidx == self.sched.len() {
            // End of replay; extend the schedule
            let can_true = self.solver.check_assuming_isolated(&term);
            let can_false = self.solver.check_assuming_isolated(&negated);

            if can_true.is_unsat() && can_false.is_unsat() {
                return Err(SpexException::BranchContradiction);
            }

            if can_true.is_sat() && can_false.is_unsat() {
                let node = self.last_node();
                self.sched.push(SchedEntry::taken(true, node));
            } else if can_true.is_unsat() && can_false.is_sat() {
                let node = self.last_node();
                self.sched.push(SchedEntry::taken(false, node));
            } else {
                // Both directions possible (or undecided); fork
                let decision = self.last_node();
                self.graph.set_label(decision, &term.to_string());
                let true_node = self.graph.new_node();
                let false_node = self.graph.new_node();
                self.graph.new_edge(decision, true_node, "T");
                self.graph.new_edge(decision, false_node, "F");

                let mut alternative = self.sched.clone();
                let current = if can_true.is_sat() {
                    SchedEntry::taken(true, true_node)
                } else {
                    SchedEntry::uncheckable(
                        term.to_string(),
                        can_true.reason().to_string(),
                        true_node,
                    )
                };
                let opposite = if can_false.is_sat() {
                    SchedEntry::taken(false, false_node)
                } else {
                    SchedEntry::uncheckable(
                        negated.to_string(),
                        can_false.reason().to_string(),
                        false_node,
                    )
                };
                self.sched.push(current);
                alternative.push(opposite);
                self.pending.push(alternative);
            }
        }

        // Follow the schedule (which we may have just extended)
        let entry = self.sched[self.schedidx].choice.clone();
        let decided = match entry {
            Choice::Taken(true) => {
                self.solver.assert(&term);
                true
            }
            Choice::Taken(false) => {
                self.solver.assert(&negated);
                false
            }
            Choice::Uncheckable { expr, reason } => {
                return Err(SpexException::UncheckableConstraint { expr, reason })
            }
            Choice::Assume => {
                return Err(SpexException::Internal(
                    "branch reached an assumption schedule entry".to_string(),
                ))
            }
        };
        self.schedidx += 1;
        Ok(decided)
    }

    /// Declare a boolean condition true on the current path.
    ///
    /// Conditions already implied by the path are a no-op and do not lengthen
    /// the schedule. An assumption that makes the path infeasible raises
    /// `UnsatisfiablePath`; one the solver cannot decide raises
    /// `UncheckableConstraint`.
    pub fn assume(&mut self, cond: &SpexBool<'ctx>) -> SpexResult<()> {
        if let SpexBool::Concrete(true) = cond {
            return Ok(());
        }
        let term = cond.as_z3(self.ctx());

        // Already implied? This keeps generated expressions and the graph
        // clean, and skipping the schedule entry keeps replays aligned.
        if self.solver.check_assuming(&term.not()).is_unsat() {
            return Ok(());
        }

        if self.schedidx == self.sched.len() {
            let from = self.last_node();
            self.graph.set_label(from, &term.to_string());
            let next = self.graph.new_node();
            self.graph.new_edge(from, next, "");
            self.sched.push(SchedEntry::assume(next));
        }

        if !self.sched[self.schedidx].is_assumption() {
            return Err(SpexException::Internal(
                "schedule desync: expected an assumption entry".to_string(),
            ));
        }
        self.schedidx += 1;

        self.solver.assert(&term);
        let outcome = self.solver.check_isolated();
        if outcome.is_unsat() {
            return Err(SpexException::UnsatisfiablePath);
        }
        if outcome.is_unknown() {
            return Err(uncheckable(&term, &outcome));
        }
        Ok(())
    }
}

impl<'env, 'ctx> AssumeHost<'ctx> for Exec<'env, 'ctx> {
    fn fresh_binder(&mut self, sort: &Sort) -> SpexResult<SpexValue<'ctx>> {
        // Bare on purpose: binders only ever occur bound under the
        // quantifier being built, so their own invariants must not be
        // asserted on the path.
        let name = self.anon_name();
        self.build_value(sort, &name, &[])
    }

    fn assume_bool(&mut self, cond: SpexBool<'ctx>) -> SpexResult<()> {
        self.assume(&cond)
    }
}
