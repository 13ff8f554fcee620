// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The transition oracle: the full transition relation plus per-frame
//! activation literals, so the clause set of frame `i` can be switched into a
//! query by assuming one literal.

use aig::cube::{Assignment, Cube, Lit};
use aig::TransitionSystem;

use crate::sat::{SatSolver, SolverError};

/// A solving session scoped to the whole transition relation.
///
/// Forward and backward search share one session shape: assumptions are
/// primed through the next-state map in forward mode and left on the latch
/// variables in backward mode, and frame clauses are encoded the opposite
/// way around.
pub struct TransitionSolver {
    sat: SatSolver,
    frame_flags: Vec<Lit>,
    next_flag: Lit,
}

impl TransitionSolver {
    /// A session over the full clause set of `sys`.
    pub fn new(sys: &TransitionSystem) -> TransitionSolver {
        let mut sat = SatSolver::new();
        for clause in sys.clauses() {
            sat.add_clause(clause);
        }
        TransitionSolver {
            sat,
            frame_flags: Vec::new(),
            next_flag: sys.max_id() + 1,
        }
    }

    /// The dead-state session: the transition relation with the monitored
    /// condition asserted false. A state with no one-step extension here can
    /// never lie on a violating trace.
    pub fn with_blocked_bad(sys: &TransitionSystem, bad: Lit) -> TransitionSolver {
        let mut solver = TransitionSolver::new(sys);
        solver.sat.add_clause(&[-bad]);
        solver
    }

    /// The activation literal owned by frame `level`, allocated on first use.
    fn flag_of(&mut self, level: usize) -> Lit {
        while level >= self.frame_flags.len() {
            self.frame_flags.push(self.next_flag);
            self.next_flag += 1;
        }
        self.frame_flags[level]
    }

    /// Assume a state cube against frame `level` (`None` for a frame-free
    /// query). Forward mode primes each literal through the next-state map.
    pub fn assume_state(
        &mut self,
        sys: &TransitionSystem,
        cube: &[Lit],
        level: Option<usize>,
        forward: bool,
    ) {
        self.sat.clear_assumptions();
        if let Some(level) = level {
            let flag = self.flag_of(level);
            self.sat.assume(flag);
        }
        for &l in cube {
            if forward {
                let p = sys.prime(l);
                debug_assert!(p != 0, "priming a non-latch literal {l}");
                self.sat.assume(p);
            } else {
                self.sat.assume(l);
            }
        }
    }

    /// Assume the monitored literal first and a cube unprimed after it; the
    /// immediate-violation query.
    pub fn assume_bad(&mut self, bad: Lit, cube: &[Lit]) {
        self.sat.clear_assumptions();
        self.sat.assume(bad);
        for &l in cube {
            self.sat.assume(l);
        }
    }

    /// Solve under the assumptions installed by the `assume_*` methods.
    pub fn solve(&mut self) -> Result<bool, SolverError> {
        self.sat.solve()
    }

    /// Extract the discovered state from a satisfying assignment: the input
    /// valuation and the latch cube of the new state (read through the
    /// next-state variables in backward mode). With `partial`, latches the
    /// solver left unassigned are dropped instead of defaulted.
    pub fn state(
        &self,
        sys: &TransitionSystem,
        forward: bool,
        partial: bool,
    ) -> (Cube, Cube) {
        let assignment = self.sat.assignment();
        if forward {
            split_assignment(&assignment, sys, partial)
        } else {
            let inputs = input_values(&assignment, sys);
            let mut latches = Cube::new();
            for i in 0..sys.num_latches() {
                let v = (sys.num_inputs() + 1 + i) as Lit;
                let p = sys.prime(v);
                debug_assert!(p != 0);
                match value_of(&assignment, p.abs()) {
                    0 if partial => {}
                    0 => latches.push(-v),
                    val => latches.push(if (val > 0) == (p > 0) { v } else { -v }),
                }
            }
            (inputs, latches)
        }
    }

    /// Extract input and latch cubes over the current-state variables,
    /// ignoring direction; used by the immediate-violation queries, whose
    /// assumptions are never primed.
    pub fn state_unprimed(&self, sys: &TransitionSystem) -> (Cube, Cube) {
        split_assignment(&self.sat.assignment(), sys, false)
    }

    /// The unsat core of an immediate-violation query, with the monitored
    /// literal removed.
    pub fn conflict_for_bad(&mut self, bad: Lit) -> Cube {
        let mut core: Cube = self
            .sat
            .failed_assumptions()
            .into_iter()
            .filter(|&l| l != bad)
            .collect();
        aig::cube::sort_cube(&mut core);
        core
    }

    /// The unsat core of a transition query, shrunk back to latch variables.
    /// Returns the core and whether it qualifies as a permanent constraint
    /// (no literal was tied to the frame or to input variables). With
    /// `minimal`, the raw core is first reduced by iterative dropping.
    pub fn conflict(
        &mut self,
        sys: &TransitionSystem,
        forward: bool,
        minimal: bool,
    ) -> Result<(Cube, bool), SolverError> {
        let mut core = self.sat.failed_assumptions();
        if minimal {
            core = self.sat.minimize_core(core)?;
        }
        let constraint = if forward {
            sys.shrink_to_previous_vars(&mut core)
        } else {
            sys.shrink_to_latch_vars(&mut core)
        };
        aig::cube::sort_cube(&mut core);
        Ok((core, constraint))
    }

    /// Install the blocking clause of `cube` under frame `level`'s activation
    /// literal. Backward mode blocks the cube in the next state.
    pub fn add_frame_clause(
        &mut self,
        sys: &TransitionSystem,
        cube: &[Lit],
        level: usize,
        forward: bool,
    ) {
        let flag = self.flag_of(level);
        let mut clause = vec![-flag];
        for &l in cube {
            if forward {
                clause.push(-l);
            } else {
                let p = sys.prime(l);
                debug_assert!(p != 0);
                clause.push(-p);
            }
        }
        self.sat.add_clause(&clause);
    }

    /// Install a whole frame at `level`.
    pub fn add_frame(
        &mut self,
        sys: &TransitionSystem,
        cubes: &[Cube],
        level: usize,
        forward: bool,
    ) {
        for cube in cubes {
            self.add_frame_clause(sys, cube, level, forward);
        }
    }

    /// Install a permanent (guarded) constraint clause.
    pub fn add_constraint(&mut self, cube: &[Lit]) {
        self.sat.add_clause_from_cube(cube);
    }
}

/// Split a raw assignment into input and latch cubes over the current-state
/// variables. Unassigned variables default to false, or are dropped from the
/// latch cube when `partial` is set.
pub fn split_assignment(
    assignment: &Assignment,
    sys: &TransitionSystem,
    partial: bool,
) -> (Cube, Cube) {
    let inputs = input_values(assignment, sys);
    let mut latches = Cube::new();
    for i in 0..sys.num_latches() {
        let v = (sys.num_inputs() + 1 + i) as Lit;
        match value_of(assignment, v) {
            0 if partial => {}
            0 => latches.push(-v),
            val => latches.push(val),
        }
    }
    (inputs, latches)
}

fn input_values(assignment: &Assignment, sys: &TransitionSystem) -> Cube {
    (1..=sys.num_inputs() as Lit)
        .map(|v| match value_of(assignment, v) {
            0 => -v,
            val => val,
        })
        .collect()
}

fn value_of(assignment: &Assignment, var: Lit) -> Lit {
    assignment.get(var as usize - 1).copied().unwrap_or(0)
}
