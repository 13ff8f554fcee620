// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The engine's policy record. One engine, parameterized once at
//! construction; the search branches on these values instead of duplicating
//! the algorithm per variant.

/// Which stored state the search expands first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Depth-first: revisit the deepest discovered states first.
    DeepestFirst,
    /// Greedy: always expand the shallowest unresolved state first.
    ShallowestFirst,
}

/// Policy flags for one checker instance.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Search from the monitored states toward the initial states instead of
    /// the other way around.
    pub forward: bool,
    /// Record and report witness traces for violated properties.
    pub witness: bool,
    /// Minimize unsat cores before learning clauses from them.
    pub minimal_core: bool,
    /// Push frame clauses forward between outer iterations, detecting
    /// propagation fixpoints.
    pub propagate: bool,
    /// Prune states that provably cannot lie on any violating trace.
    pub detect_dead: bool,
    /// Bias generalization toward literals shared with earlier cores.
    pub intersection: bool,
    /// Keep only solver-assigned latch literals in discovered states.
    pub partial_state: bool,
    /// Order in which stored states are re-expanded.
    pub traversal: Traversal,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            forward: false,
            witness: false,
            minimal_core: false,
            propagate: true,
            detect_dead: false,
            intersection: false,
            partial_state: false,
            traversal: Traversal::DeepestFirst,
        }
    }
}
