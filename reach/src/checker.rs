// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The search engine: per-output orchestration, iterative frame deepening,
//! the recursive state-satisfaction search, generalization, and fixpoint
//! detection.

use std::time::Instant;

use aig::cube::{intersect, Cube, Lit};
use aig::TransitionSystem;
use solver::{InvSolver, SolverError, StartSolver, TransitionSolver};

use crate::config::{CheckOptions, Traversal};
use crate::frames::{FrameSequence, Inserted};
use crate::state::{State, StateId, StateStore};
use crate::stats::Stats;
use crate::witness::Witness;

/// The outcome of checking one monitored output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The monitored condition is unreachable; the final frame is the
    /// inductive invariant.
    Safe {
        /// Number of frames at the fixpoint.
        frames: usize,
    },
    /// The monitored condition is reachable.
    Violated {
        /// The trace, when witness recording is enabled.
        witness: Option<Witness>,
    },
}

/// A verdict paired with the output it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyResult {
    /// Index of the monitored output.
    pub output: usize,
    /// Its verdict.
    pub verdict: Verdict,
}

/// Checks every monitored output of a transition system in sequence.
pub struct Checker<'a> {
    sys: &'a TransitionSystem,
    opts: CheckOptions,
    stats: Stats,
}

impl<'a> Checker<'a> {
    /// A checker over `sys` with the given policy record.
    pub fn new(sys: &'a TransitionSystem, opts: CheckOptions) -> Checker<'a> {
        Checker {
            sys,
            opts,
            stats: Stats::default(),
        }
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Decide every monitored output. Each property runs against a private
    /// copy of the encoding, since learned permanent constraints are
    /// specific to one monitored condition; everything a property check
    /// builds up is torn down before the next one starts.
    pub fn check(&mut self) -> Result<Vec<PropertyResult>, SolverError> {
        let mut results = Vec::new();
        for output in 0..self.sys.num_outputs() {
            let bad = self.sys.output(output);
            let verdict = if bad == self.sys.true_id() {
                log::info!("output {output} is constant true");
                Verdict::Violated {
                    witness: self.opts.witness.then(|| {
                        Witness::trivial(
                            self.sys.init(),
                            self.sys.num_inputs(),
                            self.sys.num_latches(),
                        )
                    }),
                }
            } else if bad == self.sys.false_id() {
                log::info!("output {output} is constant false");
                Verdict::Safe { frames: 0 }
            } else {
                let mut sys = self.sys.clone();
                Search::new(&mut sys, &self.opts, &mut self.stats, bad).run()?
            };
            results.push(PropertyResult { output, verdict });
        }
        Ok(results)
    }
}

/// One property check: owns the oracle sessions, the frame sequence, and the
/// state store, all discarded when the check ends.
struct Search<'a> {
    sys: &'a mut TransitionSystem,
    opts: &'a CheckOptions,
    stats: &'a mut Stats,
    bad: Lit,
    solver: TransitionSolver,
    start: StartSolver,
    dead: Option<TransitionSolver>,
    frames: FrameSequence,
    store: StateStore,
    constraints: Vec<Cube>,
    frames_intersect: Vec<Cube>,
    constraint_intersect: Cube,
    minimal_update_level: i32,
    safe_reported: bool,
    init_id: StateId,
    last_id: Option<StateId>,
}

impl<'a> Search<'a> {
    fn new(
        sys: &'a mut TransitionSystem,
        opts: &'a CheckOptions,
        stats: &'a mut Stats,
        bad: Lit,
    ) -> Search<'a> {
        let solver = TransitionSolver::new(sys);
        let start = StartSolver::new(sys, bad, opts.forward);
        let dead = opts
            .detect_dead
            .then(|| TransitionSolver::with_blocked_bad(sys, bad));
        let mut store = StateStore::new();
        let init_id = store.add_anchor(State {
            latches: sys.init().clone(),
            initial: true,
            ..State::default()
        });
        Search {
            sys,
            opts,
            stats,
            bad,
            solver,
            start,
            dead,
            frames: FrameSequence::new(),
            store,
            constraints: Vec::new(),
            frames_intersect: Vec::new(),
            constraint_intersect: Cube::new(),
            minimal_update_level: -1,
            safe_reported: false,
            init_id,
            last_id: None,
        }
    }

    fn run(&mut self) -> Result<Verdict, SolverError> {
        log::debug!("checking monitored literal {}", self.bad);
        if self.immediate()? {
            log::debug!("violated by an initial state");
            return Ok(self.violated());
        }
        self.initialize_frames();
        if self.safe_reported {
            return Ok(self.safe());
        }
        let mut level: i32 = 0;
        loop {
            log::debug!("deepening: level {level}, {} frames", self.frames.len());
            self.start.reset();
            self.frames.clear_pending();
            if self.opts.propagate && self.propagate()? {
                log::debug!("safe: propagation fixpoint");
                return Ok(self.safe());
            }
            self.minimal_update_level = self.frames.len() as i32 - 1;
            if self.try_satisfy(level)? {
                log::debug!("violated at level {level}");
                return Ok(self.violated());
            }
            if self.safe_reported {
                log::debug!("safe: empty core");
                return Ok(self.safe());
            }
            self.extend_frames();
            level += 1;
            if self.invariant_found(level + 1)? {
                log::debug!("safe: invariant at {} frames", self.frames.len());
                return Ok(self.safe());
            }
        }
    }

    fn safe(&self) -> Verdict {
        Verdict::Safe {
            frames: self.frames.len(),
        }
    }

    fn violated(&mut self) -> Verdict {
        let witness = if !self.opts.witness {
            None
        } else if self.opts.forward {
            Some(Witness::forward(
                &self.store,
                self.init_id,
                self.sys.num_inputs(),
                self.sys.num_latches(),
            ))
        } else {
            self.last_id.map(|id| {
                Witness::backward(
                    &self.store,
                    id,
                    self.sys.num_inputs(),
                    self.sys.num_latches(),
                )
            })
        };
        Verdict::Violated { witness }
    }

    /// Is the monitored condition already true of an initial state?
    fn immediate(&mut self) -> Result<bool, SolverError> {
        let init = self.sys.init().clone();
        let t = Instant::now();
        self.solver.assume_bad(self.bad, &init);
        let sat = self.solver.solve()?;
        self.stats.transition.record(t);
        if !sat {
            return Ok(false);
        }
        let (inputs, latches) = self.solver.state_unprimed(self.sys);
        if self.opts.forward {
            if let Some(anchor) = self.store.get_mut(self.init_id) {
                anchor.inputs = inputs;
            }
        } else {
            let id = self.store.add_anchor(State {
                latches,
                last_inputs: inputs,
                ..State::default()
            });
            self.last_id = Some(id);
        }
        Ok(true)
    }

    /// Frame 0. Forward: the complement of each initial-state literal.
    /// Backward: the reason the initial states cannot be monitored states,
    /// taken from the conflict of the immediate query just made; an empty
    /// reason already proves the property.
    fn initialize_frames(&mut self) {
        if self.opts.forward {
            let frame: Vec<Cube> = self.sys.init().iter().map(|&l| vec![-l]).collect();
            self.frames.push_frame(frame.clone());
            self.solver.add_frame(self.sys, &frame, 0, true);
        } else {
            let cu = self.solver.conflict_for_bad(self.bad);
            if cu.is_empty() {
                self.safe_reported = true;
                return;
            }
            self.solver.add_frame_clause(self.sys, &cu, 0, false);
            self.frames.push_frame(vec![cu]);
        }
    }

    fn extend_frames(&mut self) {
        let cubes = self.frames.extend();
        let level = self.frames.len() - 1;
        self.solver.add_frame(self.sys, &cubes, level, self.opts.forward);
    }

    /// One round of the outer search: revisit every stored state, then
    /// enumerate fresh anchor states.
    fn try_satisfy(&mut self, level: i32) -> Result<bool, SolverError> {
        let pruned = self.store.remove_dead(&self.constraints);
        self.stats.dead_pruned += pruned;

        match self.opts.traversal {
            Traversal::DeepestFirst => {
                for i in (0..self.store.num_levels()).rev() {
                    if let Some(outcome) = self.expand_bucket(level, i)? {
                        return Ok(outcome);
                    }
                }
            }
            Traversal::ShallowestFirst => {
                let mut i = 0;
                while i < self.store.num_levels() {
                    if let Some(outcome) = self.expand_bucket(level, i)? {
                        return Ok(outcome);
                    }
                    i += 1;
                }
            }
        }

        while let Some(id) = self.enumerate_start_state()? {
            if self.try_satisfy_by(level, id)? {
                return Ok(true);
            }
            if self.safe_reported {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Work one depth bucket; `Some(outcome)` short-circuits the round.
    fn expand_bucket(&mut self, level: i32, i: usize) -> Result<Option<bool>, SolverError> {
        let mut j = 0;
        while j < self.store.bucket_len(i) {
            if let Some(id) = self.store.bucket_state(i, j) {
                if self.try_satisfy_by(level, id)? {
                    return Ok(Some(true));
                }
                if self.safe_reported {
                    return Ok(Some(false));
                }
            }
            j += 1;
        }
        Ok(None)
    }

    /// The recursive core: drive `id` toward the anchor through frame
    /// `level`, materializing intermediate states on satisfiable steps and
    /// learning blocking clauses on unsatisfiable ones.
    fn try_satisfy_by(&mut self, mut level: i32, id: StateId) -> Result<bool, SolverError> {
        if self.tried_before(id, level + 1) {
            return Ok(false);
        }
        if level < self.minimal_update_level {
            self.minimal_update_level = level;
        }
        log::trace!("try_satisfy_by: level {level}, state {id}");

        if level == -1 {
            if self.immediate_state(id)? {
                return Ok(true);
            }
        } else {
            loop {
                if !self.solve_state(id, level)? {
                    break;
                }
                let (inputs, latches) =
                    self.solver
                        .state(self.sys, self.opts.forward, self.opts.partial_state);
                let depth = self.store.get(id).map_or(0, |s| s.depth + 1);
                let new_state = State {
                    inputs,
                    latches,
                    prev: (!self.opts.forward).then_some(id),
                    next: self.opts.forward.then_some(id),
                    depth,
                    dead_cursor: self.constraints.len(),
                    ..State::default()
                };
                let new_level = self.landing_level(&new_state, level);
                if self.opts.detect_dead && new_level != -1 && self.dead_check(&new_state)? {
                    self.stats.dead_pruned += 1;
                    self.learn_dead_constraint()?;
                    if self.safe_reported {
                        return Ok(false);
                    }
                    continue;
                }
                let new_id = self.store.add(new_state, level as usize);
                if self.try_satisfy_by(new_level, new_id)? {
                    return Ok(true);
                }
                if self.safe_reported {
                    return Ok(false);
                }
                // The recursion may have blocked this state further out;
                // climb to the first level where it is still open.
                if (level as usize) < self.frames.len() {
                    while self.tried_before(id, level + 1) {
                        level += 1;
                        if level as usize >= self.frames.len() {
                            return Ok(false);
                        }
                    }
                }
            }
        }

        self.generalize_blocked(id, level + 1)?;
        if self.safe_reported {
            return Ok(false);
        }
        level += 1;
        if (level as usize) < self.frames.len() {
            return self.try_satisfy_by(level, id);
        }
        Ok(false)
    }

    /// Level −1: the state has reached the anchor. Forward, the state *is*
    /// initial and the anchor adopts its trace; backward, confirm the state
    /// satisfies the monitored condition under some input.
    fn immediate_state(&mut self, id: StateId) -> Result<bool, SolverError> {
        if self.opts.forward {
            let Some((inputs, next)) = self.store.get(id).map(|s| (s.inputs.clone(), s.next))
            else {
                return Ok(false);
            };
            if let Some(anchor) = self.store.get_mut(self.init_id) {
                anchor.inputs = inputs;
                anchor.next = next;
            }
            return Ok(true);
        }
        let Some(cube) = self.store.get(id).map(|s| s.latches.clone()) else {
            return Ok(false);
        };
        let t = Instant::now();
        self.solver.assume_bad(self.bad, &cube);
        let sat = self.solver.solve()?;
        self.stats.transition.record(t);
        if !sat {
            return Ok(false);
        }
        let (inputs, _) = self.solver.state_unprimed(self.sys);
        if let Some(state) = self.store.get_mut(id) {
            state.last_inputs = inputs;
        }
        self.last_id = Some(id);
        Ok(true)
    }

    /// Fresh anchor states, skipping dead ones.
    fn enumerate_start_state(&mut self) -> Result<Option<StateId>, SolverError> {
        loop {
            let t = Instant::now();
            let sat = self.start.solve()?;
            self.stats.start.record(t);
            if !sat {
                return Ok(None);
            }
            let (inputs, latches) = self.start.state(self.sys);
            let state = State {
                inputs: if self.opts.forward { inputs.clone() } else { Cube::new() },
                last_inputs: if self.opts.forward { Cube::new() } else { inputs },
                latches,
                dead_cursor: self.constraints.len(),
                ..State::default()
            };
            if self.opts.detect_dead && self.dead_check(&state)? {
                self.stats.dead_pruned += 1;
                self.learn_dead_constraint()?;
                if self.safe_reported {
                    return Ok(None);
                }
                continue;
            }
            return Ok(Some(self.store.add(state, 0)));
        }
    }

    /// Whether the state can never lie on a violating trace: it has no
    /// one-step extension consistent with the transition relation and the
    /// negated monitored condition.
    fn dead_check(&mut self, state: &State) -> Result<bool, SolverError> {
        let Some(dead) = self.dead.as_mut() else {
            return Ok(false);
        };
        let t = Instant::now();
        dead.assume_state(self.sys, &state.latches, None, self.opts.forward);
        let sat = dead.solve()?;
        self.stats.dead.record(t);
        Ok(!sat)
    }

    /// Generalize the dead state just refuted into a permanent constraint.
    fn learn_dead_constraint(&mut self) -> Result<(), SolverError> {
        let cu = match self.dead.as_mut() {
            Some(dead) => dead.conflict(self.sys, self.opts.forward, self.opts.minimal_core)?.0,
            None => return Ok(()),
        };
        self.update_constraint(cu, None)
    }

    /// Solve "does `id`'s state extend one step against frame `level`".
    fn solve_state(&mut self, id: StateId, level: i32) -> Result<bool, SolverError> {
        let Some(cube) = self.store.get(id).map(|s| s.latches.clone()) else {
            return Ok(false);
        };
        self.solve_cube(&cube, level)
    }

    /// Solve a cube against a level: −1 is the anchor query, −2 a frame-free
    /// transition query, anything else assumes the frame's activation
    /// literal.
    fn solve_cube(&mut self, cube: &[Lit], level: i32) -> Result<bool, SolverError> {
        if level == -1 {
            if self.opts.forward {
                // The cube agrees with every initial literal; nothing to ask.
                return Ok(true);
            }
            let t = Instant::now();
            self.solver.assume_bad(self.bad, cube);
            let sat = self.solver.solve()?;
            self.stats.transition.record(t);
            return Ok(sat);
        }
        let frame = (level >= 0).then_some(level as usize);
        let t = Instant::now();
        self.solver
            .assume_state(self.sys, cube, frame, self.opts.forward);
        let sat = self.solver.solve()?;
        self.stats.transition.record(t);
        Ok(sat)
    }

    /// The lowest frame whose cubes do not already exclude `state`, minus
    /// one; where the recursion continues for a fresh state.
    fn landing_level(&self, state: &State, level: i32) -> i32 {
        for i in 0..level.max(0) as usize {
            if !self.frames.frame(i).iter().any(|cu| state.implies(cu)) {
                return i as i32 - 1;
            }
        }
        level - 1
    }

    /// Whether `id`'s state is already excluded at `level` by a permanent
    /// constraint or by the frame's clause set.
    fn tried_before(&mut self, id: StateId, level: i32) -> bool {
        let Some(state) = self.store.get(id) else {
            return true;
        };
        for cu in &self.constraints {
            if state.implies(cu) {
                return true;
            }
        }
        let t = Instant::now();
        let frame = if (level as usize) < self.frames.len() {
            self.frames.frame(level as usize)
        } else {
            self.frames.pending()
        };
        let excluded = frame.iter().any(|cu| state.implies(cu));
        self.stats.state_subsumption.record(t);
        excluded
    }

    /// The state was refuted at `target - 1`; turn the refutation's core
    /// into a blocking clause at `target`, or into a permanent constraint
    /// when the core has no frame-specific component. An empty core proves
    /// the property outright.
    fn generalize_blocked(&mut self, id: StateId, target: i32) -> Result<(), SolverError> {
        let (cu, constraint) =
            self.solver
                .conflict(self.sys, self.opts.forward, self.opts.minimal_core)?;
        if cu.is_empty() {
            self.safe_reported = true;
            return Ok(());
        }
        let bias = self.opts.intersection.then_some(id);
        if constraint {
            self.update_constraint(cu, bias)
        } else {
            self.push_to_frame(cu, target, bias)
        }
    }

    /// Insert a blocking cube at `level` (the pending buffer when `level`
    /// equals the frame count), keeping the frame subsumption-minimal and
    /// mirroring the clause into the owning oracle.
    fn push_to_frame(
        &mut self,
        cu: Cube,
        level: i32,
        bias: Option<StateId>,
    ) -> Result<(), SolverError> {
        let cu = match bias {
            Some(id) => self.cube_intersection(id, cu, level)?,
            None => cu,
        };
        if self.safe_reported {
            return Ok(());
        }
        let t = Instant::now();
        let added = self.frames.insert(cu.clone(), level as usize);
        self.stats.clause_subsumption.record(t);
        if added == Inserted::Added {
            if (level as usize) < self.frames.len() {
                self.solver
                    .add_frame_clause(self.sys, &cu, level as usize, self.opts.forward);
            } else {
                self.start.add_blocking_clause(&cu);
            }
        }
        Ok(())
    }

    /// Bias the core toward the literals the recent cores at this level
    /// share with the refuted state, so consecutive clauses refine each
    /// other instead of diverging. Performance-only; the returned cube is
    /// always a valid core.
    fn cube_intersection(
        &mut self,
        id: StateId,
        cu: Cube,
        level: i32,
    ) -> Result<Cube, SolverError> {
        let Some(latches) = self.store.get(id).map(|s| s.latches.clone()) else {
            return Ok(cu);
        };
        let lvl = level as usize;
        while self.frames_intersect.len() <= lvl {
            self.frames_intersect.push(Cube::new());
        }
        let inter = intersect(&latches, &self.frames_intersect[lvl]);
        if inter.is_empty() {
            self.frames_intersect[lvl] = latches;
            return Ok(cu);
        }
        self.frames_intersect[lvl] = inter.clone();
        if !self.solve_cube(&inter, level - 1)? {
            let (c, _) =
                self.solver
                    .conflict(self.sys, self.opts.forward, self.opts.minimal_core)?;
            if c.is_empty() {
                self.safe_reported = true;
                return Ok(cu);
            }
            Ok(c)
        } else {
            Ok(cu)
        }
    }

    /// Learn a permanent constraint: record it, push the guarded clause into
    /// the encoding and every live session, and let the next `remove_dead`
    /// sweep discard subsumed states.
    fn update_constraint(&mut self, cu: Cube, bias: Option<StateId>) -> Result<(), SolverError> {
        if cu.is_empty() {
            self.safe_reported = true;
            return Ok(());
        }
        let mut to_add = cu;
        if let Some(id) = bias {
            let latches = self.store.get(id).map(|s| s.latches.clone());
            if let Some(latches) = latches {
                let inter = intersect(&latches, &self.constraint_intersect);
                if inter.is_empty() {
                    self.constraint_intersect = latches;
                } else {
                    self.constraint_intersect = inter.clone();
                    if !self.solve_cube(&inter, -2)? {
                        let (c, _) = self.solver.conflict(
                            self.sys,
                            self.opts.forward,
                            self.opts.minimal_core,
                        )?;
                        if c.is_empty() {
                            self.safe_reported = true;
                            return Ok(());
                        }
                        to_add = c;
                    } else {
                        self.constraint_intersect = latches;
                    }
                }
            }
        }
        log::debug!("permanent constraint over {} literals", to_add.len());
        self.constraints.push(to_add.clone());
        self.sys.update_constraint(&mut to_add);
        self.start.add_constraint(&to_add);
        self.solver.add_constraint(&to_add);
        if let Some(dead) = self.dead.as_mut() {
            dead.add_constraint(&to_add);
        }
        Ok(())
    }

    /// Push still-holding clauses one frame forward. A level whose every
    /// clause propagates is a fixpoint: the check ends safe.
    fn propagate(&mut self) -> Result<bool, SolverError> {
        let from = (self.minimal_update_level + 1).max(0) as usize;
        for pos in from..self.frames.len() {
            if self.propagate_level(pos)? {
                return Ok(true);
            }
            if self.safe_reported {
                return Ok(false);
            }
        }
        Ok(false)
    }

    fn propagate_level(&mut self, pos: usize) -> Result<bool, SolverError> {
        let mut i = self.frames.propagate_start(pos);
        let mut sz = self.frames.frame(pos).len();
        let mut all = true;
        while i < sz {
            let cu = self.frames.frame(pos)[i].clone();
            if !self.solve_cube(&cu, pos as i32)? {
                self.push_to_frame(cu, pos as i32 + 1, None)?;
                i += 1;
            } else {
                self.frames.rotate_to_back(pos, i);
                sz -= 1;
                all = false;
            }
        }
        self.frames.set_propagate_start(pos, sz);
        Ok(all && sz > 0)
    }

    /// Fixpoint test: find the first level whose frame accepts exactly the
    /// states of the accumulated earlier frames; everything behind it is
    /// discarded and the survivor is the inductive invariant.
    fn invariant_found(&mut self, level: i32) -> Result<bool, SolverError> {
        if level <= 0 {
            return Ok(false);
        }
        let mut inv = InvSolver::new(self.sys);
        let mut found = None;
        for i in 0..(level as usize).min(self.frames.len()) {
            if self.invariant_found_at(&mut inv, i)? {
                found = Some(i);
                break;
            }
        }
        if let Some(i) = found {
            self.frames.truncate(i + 1);
        }
        Ok(found.is_some())
    }

    fn invariant_found_at(&mut self, inv: &mut InvSolver, i: usize) -> Result<bool, SolverError> {
        if (i as i32) <= self.minimal_update_level {
            // Frames up to the minimal touched level did not change this
            // round; only their disjunctive encoding is needed.
            inv.add_frame_or(self.frames.frame(i));
            return Ok(false);
        }
        inv.add_frame_and(self.frames.frame(i));
        let t = Instant::now();
        let fixpoint = !inv.solve()?;
        self.stats.invariant.record(t);
        inv.release_and();
        inv.add_frame_or(self.frames.frame(i));
        Ok(fixpoint)
    }
}
