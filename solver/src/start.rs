// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The start-state enumeration session.
//!
//! Backward search anchors at the initial states, so the session is just the
//! initial cube; forward search anchors at the monitored states, so it is
//! the output cone with the monitored literal assumed. Blocking clauses for
//! the pending frame hang off a rotating activation flag which `reset`
//! advances once per outer iteration.

use aig::cube::{negated, Cube, Lit};
use aig::TransitionSystem;

use crate::sat::{SatSolver, SolverError};
use crate::transition::split_assignment;

/// Enumerates fresh anchor states, one satisfying assignment at a time.
pub struct StartSolver {
    sat: SatSolver,
    flag: Lit,
    forward: bool,
}

impl StartSolver {
    /// Build the session for one monitored output.
    pub fn new(sys: &TransitionSystem, bad: Lit, forward: bool) -> StartSolver {
        let mut sat = SatSolver::new();
        if forward {
            for clause in &sys.clauses()[..sys.latches_start()] {
                sat.add_clause(clause);
            }
            sat.assume(bad);
        } else {
            sat.add_cube(sys.init());
        }
        StartSolver {
            sat,
            flag: sys.max_id() + 1,
            forward,
        }
    }

    /// Start a new outer iteration: permanently disable the previous pending
    /// frame's blocking clauses and open a fresh activation flag.
    pub fn reset(&mut self) {
        let threshold = if self.forward { 1 } else { 0 };
        if self.sat.assumptions().len() <= threshold {
            let flag = self.flag;
            self.sat.assume(flag);
            return;
        }
        self.sat.pop_assumption();
        let retired = self.flag;
        self.sat.assume(-retired);
        self.flag += 1;
        let flag = self.flag;
        self.sat.assume(flag);
    }

    /// Ask for another anchor state.
    pub fn solve(&mut self) -> Result<bool, SolverError> {
        self.sat.solve()
    }

    /// The enumerated state: input and latch cubes over current-state
    /// variables. Valid only right after a satisfiable solve.
    pub fn state(&self, sys: &TransitionSystem) -> (Cube, Cube) {
        split_assignment(&self.sat.assignment(), sys, false)
    }

    /// Block a pending-frame cube under the current activation flag.
    pub fn add_blocking_clause(&mut self, cube: &[Lit]) {
        let mut clause = vec![-self.flag];
        clause.extend(negated(cube));
        self.sat.add_clause(&clause);
    }

    /// Install a permanent (guarded) constraint clause.
    pub fn add_constraint(&mut self, cube: &[Lit]) {
        self.sat.add_clause_from_cube(cube);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aig::parser::parse;

    fn single_latch() -> TransitionSystem {
        TransitionSystem::new(&parse(b"aag 2 1 1 1 0\n2\n4 2\n4\n").unwrap())
    }

    #[test]
    fn backward_enumerates_initial_states() {
        let sys = single_latch();
        let mut start = StartSolver::new(&sys, 2, false);
        start.reset();
        assert!(start.solve().unwrap());
        let (_, latches) = start.state(&sys);
        assert_eq!(latches, vec![-2]);
    }

    #[test]
    fn blocking_clause_exhausts_enumeration() {
        let sys = single_latch();
        let mut start = StartSolver::new(&sys, 2, false);
        start.reset();
        assert!(start.solve().unwrap());
        start.add_blocking_clause(&[-2]);
        assert!(!start.solve().unwrap());
        // The next iteration retires the blocking clause but keeps the
        // initial cube.
        start.reset();
        assert!(start.solve().unwrap());
    }

    #[test]
    fn forward_enumerates_monitored_states() {
        let sys = single_latch();
        let mut start = StartSolver::new(&sys, 2, true);
        start.reset();
        assert!(start.solve().unwrap());
        let (_, latches) = start.state(&sys);
        assert_eq!(latches, vec![2]);
    }
}
