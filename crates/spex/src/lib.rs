// SPDX-License-Identifier: AGPL-3.0

//! SPEX — symbolic path exploration over an SMT solver.
//!
//! SPEX explores all feasible control-flow paths of a closure whose inputs
//! are symbolic values backed by Z3. On each path it accumulates a path
//! condition, prunes infeasible directions, and yields one result per
//! distinct feasible path along with a satisfying model for the symbolic
//! inputs that path used.
//!
//! ```no_run
//! use spex::{explore, Sort};
//!
//! let cfg = z3::Config::new();
//! let ctx = z3::Context::new(&cfg);
//!
//! let paths = explore(&ctx, |exec: &mut spex::Exec| {
//!     let x = exec.var(&Sort::int(), Some("x"))?.as_int()?;
//!     if exec.branch(&x.gt(&spex::SpexInt::from_i64(0), exec.ctx()))? {
//!         Ok(1)
//!     } else {
//!         Ok(2)
//!     }
//! })
//! .unwrap();
//!
//! for result in paths {
//!     let result = result.unwrap();
//!     let model = result.get_model(None).unwrap();
//!     println!("{:?} when x = {:?}", result.value(), model.get("x"));
//! }
//! ```

pub use spex_engine::{
    explore, Choice, ConstType, Exec, ExploreOptions, ExploreResult, Explorer, Model, ModelMap,
    ModelStruct, ModelValue, SchedEntry, Schedule, SymType, UninterpValue, VarCtor,
};
pub use spex_exceptions::{SpexException, SpexResult};
pub use spex_logs as logs;
pub use spex_graph::{ExploreGraph, NodeColor};
pub use spex_solver::{check_formula, simplify, CheckOutcome, PathSolver};
pub use spex_value::{
    const_map, declare_assumptions, logic, AssumeHost, Compound, Invariant, Lvalue, Sort,
    SortCache, SortTree, SpexBool, SpexInt, SpexValue, Step, ValueKind,
};
