// SPDX-License-Identifier: AGPL-3.0

//! Errors raised during symbolic path exploration.
//!
//! Two of these are ordinary control flow for the scheduler: an assumption
//! can make the current path infeasible, and the solver can fail to decide a
//! branch. The scheduler consumes those and moves on to the next schedule.
//! Everything else escapes to the caller.

use thiserror::Error;

/// Errors produced by the exploration engine.
#[derive(Error, Debug)]
pub enum SpexException {
    /// An `assume` made the current path infeasible. Expected; the scheduler
    /// discards the path silently.
    #[error("Unsatisfiable path")]
    UnsatisfiablePath,

    /// The solver returned *unknown* for both the incremental and the
    /// isolated check of a constraint. The path is abandoned.
    #[error("Uncheckable constraint {reason}:\n{expr}")]
    UncheckableConstraint { expr: String, reason: String },

    /// Both directions of a branch are unsatisfiable. Indicates a solver or
    /// engine bug; exploration aborts.
    #[error("Branch contradiction")]
    BranchContradiction,

    /// An exploration was started while another one is active.
    #[error("Recursive exploration attempted")]
    RecursiveExploration,

    /// A host value could not be coerced to the required sort, or a value of
    /// the wrong sort reached an operation.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A concrete value was required but the value is symbolic.
    #[error("Value is not concrete: {0}")]
    NotConcrete(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// An unrelated error from the function under exploration, annotated
    /// with the path constraint that was active when it was raised.
    #[error("{inner} in symbolic state:\n{state}")]
    InSymbolicState {
        #[source]
        inner: Box<SpexException>,
        state: String,
    },
}

impl SpexException {
    /// Whether this error only ends the current path. The scheduler recovers
    /// from these locally and keeps exploring the remaining schedules.
    pub fn ends_path_only(&self) -> bool {
        matches!(
            self,
            SpexException::UnsatisfiablePath | SpexException::UncheckableConstraint { .. }
        )
    }

    /// Attach the current path constraint to an escaping error.
    pub fn in_symbolic_state(self, state: Option<String>) -> Self {
        SpexException::InSymbolicState {
            inner: Box::new(self),
            state: state.unwrap_or_else(|| "(empty path condition)".to_string()),
        }
    }
}

/// Result type for SPEX operations.
pub type SpexResult<T> = Result<T, SpexException>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsatisfiable_path_display() {
        let err = SpexException::UnsatisfiablePath;
        assert_eq!(err.to_string(), "Unsatisfiable path");
    }

    #[test]
    fn test_uncheckable_constraint_display() {
        let err = SpexException::UncheckableConstraint {
            expr: "(> x 0)".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "Uncheckable constraint timeout:\n(> x 0)");
    }

    #[test]
    fn test_path_ending_classification() {
        assert!(SpexException::UnsatisfiablePath.ends_path_only());
        assert!(SpexException::UncheckableConstraint {
            expr: String::new(),
            reason: String::new(),
        }
        .ends_path_only());

        assert!(!SpexException::BranchContradiction.ends_path_only());
        assert!(!SpexException::RecursiveExploration.ends_path_only());
        assert!(!SpexException::Internal("oops".to_string()).ends_path_only());
    }

    #[test]
    fn test_in_symbolic_state_annotation() {
        let err = SpexException::Internal("user bug".to_string());
        let annotated = err.in_symbolic_state(Some("(= x 3)".to_string()));
        assert_eq!(
            annotated.to_string(),
            "Internal error: user bug in symbolic state:\n(= x 3)"
        );

        let err = SpexException::Internal("user bug".to_string());
        let annotated = err.in_symbolic_state(None);
        assert!(annotated.to_string().contains("(empty path condition)"));
    }
}
