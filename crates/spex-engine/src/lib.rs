// SPDX-License-Identifier: AGPL-3.0

//! Path-exploration engine.
//!
//! The engine runs a user closure whose inputs are symbolic values, forking
//! on data-dependent branches driven by the solver, and yields one result
//! per distinct feasible path along with the data needed to later project
//! concrete models.

mod explore;
mod model;
mod schedule;

pub use explore::{explore, Exec, ExploreOptions, Explorer};
pub use model::{
    ConstType, ExploreResult, Model, ModelMap, ModelStruct, ModelValue, SymType, UninterpValue,
    VarCtor,
};
pub use schedule::{Choice, SchedEntry, Schedule};
