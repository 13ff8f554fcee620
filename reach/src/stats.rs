// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Counters and timers around the oracle calls and subsumption checks.
//! Owned by the checker and threaded through the search; purely
//! observational.

use std::fmt;
use std::time::{Duration, Instant};

/// Count and accumulated wall time of one class of calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallStats {
    /// Number of calls.
    pub calls: usize,
    /// Total time spent in them.
    pub time: Duration,
}

impl CallStats {
    /// Record one call started at `start`.
    pub fn record(&mut self, start: Instant) {
        self.calls += 1;
        self.time += start.elapsed();
    }
}

/// Statistics for one checker run.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    /// Transition-oracle queries.
    pub transition: CallStats,
    /// Start-state enumeration queries.
    pub start: CallStats,
    /// Invariant-check queries.
    pub invariant: CallStats,
    /// Dead-state queries.
    pub dead: CallStats,
    /// States discarded by dead-state detection.
    pub dead_pruned: usize,
    /// Clause-against-frame subsumption passes.
    pub clause_subsumption: CallStats,
    /// State-against-frame subsumption passes.
    pub state_subsumption: CallStats,
    /// Time spent lowering the circuit.
    pub model_build: Duration,
}

impl Stats {
    fn oracle_calls(&self) -> usize {
        self.transition.calls + self.start.calls + self.invariant.calls + self.dead.calls
    }

    fn oracle_time(&self) -> Duration {
        self.transition.time + self.start.time + self.invariant.time + self.dead.time
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "model build time: {:.3}s", self.model_build.as_secs_f64())?;
        writeln!(f, "sat calls: {}", self.oracle_calls())?;
        writeln!(f, "  transition: {}", self.transition.calls)?;
        writeln!(f, "  start: {}", self.start.calls)?;
        writeln!(f, "  invariant: {}", self.invariant.calls)?;
        writeln!(f, "  dead: {}", self.dead.calls)?;
        writeln!(f, "sat time: {:.3}s", self.oracle_time().as_secs_f64())?;
        writeln!(
            f,
            "  transition: {:.3}s",
            self.transition.time.as_secs_f64()
        )?;
        writeln!(f, "  start: {:.3}s", self.start.time.as_secs_f64())?;
        writeln!(f, "  invariant: {:.3}s", self.invariant.time.as_secs_f64())?;
        writeln!(f, "  dead: {:.3}s", self.dead.time.as_secs_f64())?;
        writeln!(
            f,
            "clause subsumption: {} passes, {:.3}s",
            self.clause_subsumption.calls,
            self.clause_subsumption.time.as_secs_f64()
        )?;
        writeln!(
            f,
            "state subsumption: {} passes, {:.3}s",
            self.state_subsumption.calls,
            self.state_subsumption.time.as_secs_f64()
        )?;
        write!(f, "states pruned dead: {}", self.dead_pruned)
    }
}
