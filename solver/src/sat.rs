// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! A thin incremental session over CaDiCaL: clause addition, assumption
//! solving, model and failed-assumption extraction, and bounded unsat-core
//! minimization.

use thiserror::Error;

use aig::cube::{negated, sort_cube, Assignment, Cube, Lit};

/// Oracle failures. The engine assumes a sound and complete oracle for its
/// finite encodings; an indeterminate answer means a mis-encoded query or
/// resource exhaustion and aborts the whole check.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverError {
    /// The solver could not decide the query.
    #[error("sat solver returned an indeterminate result")]
    Indeterminate,
}

/// An incremental SAT session with an explicit assumption stack.
pub struct SatSolver {
    inner: cadical::Solver,
    assumptions: Vec<Lit>,
}

impl Default for SatSolver {
    fn default() -> Self {
        SatSolver::new()
    }
}

impl SatSolver {
    /// An empty session.
    pub fn new() -> SatSolver {
        SatSolver {
            inner: cadical::Solver::default(),
            assumptions: Vec::new(),
        }
    }

    /// Add a clause to the persistent clause set.
    pub fn add_clause(&mut self, clause: &[Lit]) {
        self.inner.add_clause(clause.iter().copied());
    }

    /// Add every literal of a cube as a unit clause.
    pub fn add_cube(&mut self, cube: &[Lit]) {
        for &l in cube {
            self.inner.add_clause([l]);
        }
    }

    /// Add the clause blocking a cube (its pointwise negation).
    pub fn add_clause_from_cube(&mut self, cube: &[Lit]) {
        self.add_clause(&negated(cube));
    }

    /// Push an assumption for subsequent [`SatSolver::solve`] calls.
    pub fn assume(&mut self, lit: Lit) {
        debug_assert!(lit != 0);
        self.assumptions.push(lit);
    }

    /// Drop all assumptions.
    pub fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    /// Remove the most recent assumption.
    pub fn pop_assumption(&mut self) {
        self.assumptions.pop();
    }

    /// The current assumption stack.
    pub fn assumptions(&self) -> &[Lit] {
        &self.assumptions
    }

    /// Solve the clause set under the current assumptions.
    pub fn solve(&mut self) -> Result<bool, SolverError> {
        match self.inner.solve_with(self.assumptions.iter().copied()) {
            Some(sat) => Ok(sat),
            None => Err(SolverError::Indeterminate),
        }
    }

    /// The value of a variable in the satisfying assignment; `None` when the
    /// solver left it unassigned. Valid only right after a satisfiable solve.
    pub fn value(&self, var: Lit) -> Option<bool> {
        debug_assert!(var > 0);
        self.inner.value(var)
    }

    /// The full assignment, indexed by `var - 1`, with 0 for unassigned
    /// variables. Valid only right after a satisfiable solve.
    pub fn assignment(&self) -> Assignment {
        (1..=self.inner.max_variable())
            .map(|v| match self.inner.value(v) {
                Some(true) => v,
                Some(false) => -v,
                None => 0,
            })
            .collect()
    }

    /// The subset of assumptions the refutation used. Valid only right after
    /// an unsatisfiable solve.
    pub fn failed_assumptions(&mut self) -> Cube {
        let assumptions = self.assumptions.clone();
        assumptions
            .into_iter()
            .filter(|&l| self.inner.failed(l))
            .collect()
    }

    /// Shrink an unsat core by iteratively dropping one literal at a time and
    /// re-solving, keeping a literal only when its removal makes the query
    /// satisfiable. Bounded by a quadratic number of extra solve calls; the
    /// result stays a core of the session's clause set. Clears the assumption
    /// stack.
    pub fn minimize_core(&mut self, core: Cube) -> Result<Cube, SolverError> {
        let budget = core.len() * core.len() + 1;
        let mut calls = 0;
        let mut kept: Vec<Lit> = Vec::new();
        let mut candidates = core;
        while let Some(cand) = candidates.pop() {
            if calls >= budget {
                kept.push(cand);
                kept.append(&mut candidates);
                break;
            }
            self.clear_assumptions();
            for &l in kept.iter().chain(candidates.iter()) {
                self.assume(l);
            }
            calls += 1;
            if self.solve()? {
                kept.push(cand);
            } else {
                let sub = self.failed_assumptions();
                candidates.retain(|l| sub.contains(l));
            }
        }
        self.clear_assumptions();
        sort_cube(&mut kept);
        log::trace!("minimized core to {} literals in {calls} calls", kept.len());
        Ok(kept)
    }
}
