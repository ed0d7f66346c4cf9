// SPDX-License-Identifier: AGPL-3.0

//! Symbolic values for path exploration.
//!
//! This crate provides the typed value layer over Z3: sort descriptors and
//! their lowering, concrete/symbolic scalar wrappers, compound trees with
//! lvalue semantics, logical helpers, and the assumption-declaration
//! protocol run for fresh lvalues.

mod compound;
mod scalar;
mod sort;
mod value;

pub mod logic;

pub use compound::{Compound, Lvalue, Step};
pub use scalar::{SpexBool, SpexInt};
pub use sort::{Invariant, Sort, SortCache, SortTree};
pub use value::{const_map, declare_assumptions, AssumeHost, SpexValue, ValueKind};
