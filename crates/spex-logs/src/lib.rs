// SPDX-License-Identifier: AGPL-3.0

//! Console diagnostics for the exploration engine.
//!
//! The scheduler re-executes the function under exploration once per path,
//! so the same decision point is reached again and again; a warning about it
//! would otherwise repeat once per schedule that replays through it. Path
//! warnings are therefore de-duplicated per (code, message) pair for the
//! lifetime of the process, and stamped with the ordinal of the path that
//! first hit them.

use colored::*;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Mutex;

/// Codes attached to engine diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UncheckableConstraint,
    BranchContradiction,
    ModelInvalid,
    InternalError,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::UncheckableConstraint => "uncheckable-constraint",
            ErrorCode::BranchContradiction => "branch-contradiction",
            ErrorCode::ModelInvalid => "model-invalid",
            ErrorCode::InternalError => "internal-error",
        }
    }
}

/// Warnings already emitted, keyed by code and message.
static EMITTED: Lazy<Mutex<HashSet<(ErrorCode, String)>>> =
    Lazy::new(|| Mutex::new(HashSet::new()));

/// Record an emission; true if this (code, message) pair is new.
fn first_emission(code: ErrorCode, message: &str) -> bool {
    let mut emitted = EMITTED.lock().unwrap();
    emitted.insert((code, message.to_string()))
}

/// Whether a (code, message) pair has already been emitted.
pub fn already_warned(code: ErrorCode, message: &str) -> bool {
    let emitted = EMITTED.lock().unwrap();
    emitted.contains(&(code, message.to_string()))
}

/// Warn about an abandoned or degraded path.
///
/// `path` is the ordinal of the path being executed when the event occurred.
/// Each (code, message) pair prints once per process; later paths replaying
/// into the same decision stay quiet.
pub fn warn_path(code: ErrorCode, path: usize, message: &str) {
    if first_emission(code, message) {
        let tag = format!("[{}] path {}:", code.code(), path);
        eprintln!("{} {}", tag.yellow().bold(), message.yellow());
    }
}

/// Warn without path context or suppression.
pub fn warn(message: &str) {
    eprintln!("{}", message.yellow());
}

/// Low-importance scheduler tracing (schedule pushes, implied assumptions).
pub fn debug(message: &str) {
    eprintln!("{}", message.dimmed());
}

/// Report an engine-level failure. Not suppressed: by the time one of these
/// fires the exploration is aborting.
pub fn error(code: ErrorCode, message: &str) {
    let tag = format!("[{}]", code.code());
    eprintln!("{} {}", tag.red().bold(), message.red());
}

/// Forget all emitted warnings (useful for testing).
pub fn reset() {
    let mut emitted = EMITTED.lock().unwrap();
    emitted.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let codes = vec![
            ErrorCode::UncheckableConstraint,
            ErrorCode::BranchContradiction,
            ErrorCode::ModelInvalid,
            ErrorCode::InternalError,
        ];

        for code in codes {
            assert!(!code.code().is_empty());
        }
    }

    #[test]
    fn test_path_warnings_suppress_replays() {
        reset();

        let msg = "abandoning path: solver gave up";
        assert!(!already_warned(ErrorCode::UncheckableConstraint, msg));

        warn_path(ErrorCode::UncheckableConstraint, 1, msg);
        assert!(already_warned(ErrorCode::UncheckableConstraint, msg));

        // A later path replaying into the same decision stays quiet but the
        // record remains
        warn_path(ErrorCode::UncheckableConstraint, 7, msg);
        assert!(already_warned(ErrorCode::UncheckableConstraint, msg));

        // A different code with the same message is a distinct event
        assert!(!already_warned(ErrorCode::BranchContradiction, msg));

        reset();
        assert!(!already_warned(ErrorCode::UncheckableConstraint, msg));
    }

    #[test]
    fn test_unsuppressed_channels() {
        reset();

        // warn/debug/error never touch the suppression set
        warn("plain warning");
        debug("trace line");
        error(ErrorCode::InternalError, "engine bug");
        assert!(!already_warned(ErrorCode::InternalError, "engine bug"));

        reset();
    }
}
