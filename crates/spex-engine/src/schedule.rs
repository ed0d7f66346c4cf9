// SPDX-License-Identifier: AGPL-3.0

//! Schedules: the recorded decision sequence that re-drives the function
//! under exploration down one path.
//!
//! The first entry is the root marker and is skipped during replay. Pending
//! schedules live in a plain stack owned by the explorer; the alternative
//! direction of a fork is pushed there and picked up after the current
//! subtree is exhausted.

use petgraph::graph::NodeIndex;

/// One recorded decision.
#[derive(Debug, Clone)]
pub enum Choice {
    /// A non-forking assumption point.
    Assume,
    /// A branch committed in the given direction.
    Taken(bool),
    /// The feasibility of this direction could not be decided; replaying
    /// into this entry abandons the path.
    Uncheckable { expr: String, reason: String },
}

/// A schedule entry: the choice and its node in the exploration graph.
#[derive(Debug, Clone)]
pub struct SchedEntry {
    pub choice: Choice,
    pub node: NodeIndex,
}

impl SchedEntry {
    pub fn assume(node: NodeIndex) -> Self {
        Self {
            choice: Choice::Assume,
            node,
        }
    }

    pub fn taken(direction: bool, node: NodeIndex) -> Self {
        Self {
            choice: Choice::Taken(direction),
            node,
        }
    }

    pub fn uncheckable(expr: String, reason: String, node: NodeIndex) -> Self {
        Self {
            choice: Choice::Uncheckable { expr, reason },
            node,
        }
    }

    /// Whether replaying this entry forks no path (assumption points).
    pub fn is_assumption(&self) -> bool {
        matches!(self.choice, Choice::Assume)
    }
}

pub type Schedule = Vec<SchedEntry>;
