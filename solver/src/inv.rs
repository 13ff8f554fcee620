// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The invariant-check session, built fresh for each fixpoint test.
//!
//! Two frame encodings over throwaway activation variables: a disjunctive
//! one ("the state lies in some blocked cube of the frame") accumulated for
//! every level already visited, and a conjunctive one ("the state avoids
//! every blocked cube of the frame") switched in for a single query and
//! released afterwards. Neither leaks into the persistent clause set of the
//! other sessions; the whole session is dropped after the check.

use aig::cube::{Cube, Lit};
use aig::TransitionSystem;

use crate::sat::{SatSolver, SolverError};

/// A throwaway session for one round of fixpoint tests.
pub struct InvSolver {
    sat: SatSolver,
    next_var: Lit,
}

impl InvSolver {
    /// A session over the constraint clauses of `sys` only.
    pub fn new(sys: &TransitionSystem) -> InvSolver {
        let mut sat = SatSolver::new();
        for clause in &sys.clauses()[..sys.outputs_start()] {
            sat.add_clause(clause);
        }
        InvSolver {
            sat,
            next_var: sys.max_id(),
        }
    }

    fn fresh_var(&mut self) -> Lit {
        self.next_var += 1;
        self.next_var
    }

    /// Assert that the state lies inside some blocked cube of `frame`.
    pub fn add_frame_or(&mut self, frame: &[Cube]) {
        let mut selectors = Vec::with_capacity(frame.len());
        for cube in frame {
            let selector = self.fresh_var();
            selectors.push(selector);
            for &l in cube {
                self.sat.add_clause(&[-selector, l]);
            }
        }
        self.sat.add_clause(&selectors);
    }

    /// Assume that the state avoids every blocked cube of `frame`; undone by
    /// [`InvSolver::release_and`].
    pub fn add_frame_and(&mut self, frame: &[Cube]) {
        let flag = self.fresh_var();
        for cube in frame {
            let mut clause: Vec<Lit> = cube.iter().map(|&l| -l).collect();
            clause.push(-flag);
            self.sat.add_clause(&clause);
        }
        self.sat.assume(flag);
    }

    /// Retire the most recent [`InvSolver::add_frame_and`] assumption.
    pub fn release_and(&mut self) {
        let flag = self.sat.assumptions().last().copied();
        if let Some(flag) = flag {
            self.sat.pop_assumption();
            self.sat.assume(-flag);
        }
    }

    /// Solve under the constraints installed so far.
    pub fn solve(&mut self) -> Result<bool, SolverError> {
        self.sat.solve()
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
    fn equal_frames_are_a_fixpoint() {
        let sys = single_latch();
        let mut inv = InvSolver::new(&sys);
        let frame: Vec<Cube> = vec![vec![2]];
        inv.add_frame_or(&frame);
        inv.add_frame_and(&frame);
        // Inside the frame's cube but avoiding it: impossible.
        assert!(!inv.solve().unwrap());
        inv.release_and();
        assert!(inv.solve().unwrap());
    }

    #[test]
    fn strictly_smaller_frame_is_not_a_fixpoint() {
        let sys = single_latch();
        let mut inv = InvSolver::new(&sys);
        inv.add_frame_or(&[vec![2]]);
        inv.add_frame_and(&[vec![2, 1]]);
        // latch=1 with input 0 is in the first frame but avoids the second.
        assert!(inv.solve().unwrap());
    }
}
