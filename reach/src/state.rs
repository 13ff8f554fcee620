// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Concrete states and the arena that owns them.
//!
//! States are created only when an oracle call succeeds and live in
//! depth-indexed buckets; predecessor/successor links are non-owning ids
//! into the arena, used solely to reconstruct traces. Removing a state
//! empties its arena slot, so a stale link reads as "gone" instead of
//! dangling.

use aig::cube::{self, Cube, Lit};

/// Index of a state in the arena.
pub type StateId = usize;

/// A concrete (possibly partial) assignment to the latch variables, plus the
/// trace links and search bookkeeping attached to it.
#[derive(Debug, Clone, Default)]
pub struct State {
    /// Input valuation that drives this state to its successor (forward
    /// search stores the inputs driving *into* the linked state).
    pub inputs: Cube,
    /// Latch literals, var-sorted; a subset when partial-state tracking is
    /// on.
    pub latches: Cube,
    /// Input valuation exhibiting the monitored condition at this state;
    /// only set on the final state of a backward trace.
    pub last_inputs: Cube,
    /// Predecessor in the trace (backward search).
    pub prev: Option<StateId>,
    /// Successor in the trace (forward search).
    pub next: Option<StateId>,
    /// Distance from the anchor that produced this state.
    pub depth: usize,
    /// How many permanent constraints this state has already been checked
    /// against.
    pub dead_cursor: usize,
    /// Whether this is the distinguished initial anchor.
    pub initial: bool,
}

impl State {
    /// Whether this state's assignment implies the cube (contains every one
    /// of its literals).
    pub fn implies(&self, cu: &[Lit]) -> bool {
        cube::implies(&self.latches, cu)
    }

    /// The literals of `cu` this state agrees with.
    pub fn intersect(&self, cu: &[Lit]) -> Cube {
        cube::intersect(&self.latches, cu)
    }
}

/// Owns every state of one property check, bucketed by the frame level at
/// which each state was discovered.
#[derive(Debug, Default)]
pub struct StateStore {
    arena: Vec<Option<State>>,
    buckets: Vec<Vec<StateId>>,
}

impl StateStore {
    /// An empty store.
    pub fn new() -> StateStore {
        StateStore::default()
    }

    /// Add a state to the arena without bucketing it (trace anchors).
    pub fn add_anchor(&mut self, state: State) -> StateId {
        self.arena.push(Some(state));
        self.arena.len() - 1
    }

    /// Add a state and file it under `level`.
    pub fn add(&mut self, state: State, level: usize) -> StateId {
        let id = self.add_anchor(state);
        while self.buckets.len() <= level {
            self.buckets.push(Vec::new());
        }
        self.buckets[level].push(id);
        id
    }

    /// The state behind `id`, if it has not been pruned.
    pub fn get(&self, id: StateId) -> Option<&State> {
        self.arena.get(id).and_then(|slot| slot.as_ref())
    }

    /// Mutable access to the state behind `id`.
    pub fn get_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.arena.get_mut(id).and_then(|slot| slot.as_mut())
    }

    /// Number of depth buckets.
    pub fn num_levels(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries filed under `level`.
    pub fn bucket_len(&self, level: usize) -> usize {
        self.buckets.get(level).map_or(0, |b| b.len())
    }

    /// The `j`-th id in bucket `level`, if the slot is still alive.
    pub fn bucket_state(&self, level: usize, j: usize) -> Option<StateId> {
        let id = *self.buckets.get(level)?.get(j)?;
        self.get(id).map(|_| id)
    }

    /// Drop every bucketed state subsumed by a permanent constraint. Each
    /// state remembers how far into the constraint list it has been checked,
    /// so repeated sweeps only look at new constraints.
    pub fn remove_dead(&mut self, constraints: &[Cube]) -> usize {
        let mut pruned = 0;
        let StateStore { arena, buckets } = self;
        for bucket in buckets.iter_mut() {
            bucket.retain(|&id| {
                let Some(slot) = arena.get_mut(id) else {
                    return false;
                };
                let Some(state) = slot.as_mut() else {
                    return false;
                };
                let mut k = state.dead_cursor;
                while k < constraints.len() && !cube::implies(&state.latches, &constraints[k]) {
                    k += 1;
                }
                if k == constraints.len() {
                    state.dead_cursor = k;
                    true
                } else {
                    *slot = None;
                    pruned += 1;
                    false
                }
            });
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(latches: Cube) -> State {
        State {
            latches,
            ..State::default()
        }
    }

    #[test]
    fn implies_and_intersect() {
        let s = state(vec![2, -3, 4]);
        assert!(s.implies(&[2, 4]));
        assert!(!s.implies(&[3]));
        assert_eq!(s.intersect(&[2, 3, -5]), vec![2]);
    }

    #[test]
    fn buckets_grow_on_demand() {
        let mut store = StateStore::new();
        let a = store.add(state(vec![2]), 0);
        let b = store.add(state(vec![-2]), 3);
        assert_eq!(store.num_levels(), 4);
        assert_eq!(store.bucket_len(0), 1);
        assert_eq!(store.bucket_len(3), 1);
        assert_eq!(store.bucket_state(0, 0), Some(a));
        assert_eq!(store.bucket_state(3, 0), Some(b));
        assert_eq!(store.bucket_state(1, 0), None);
    }

    #[test]
    fn remove_dead_prunes_subsumed_states() {
        let mut store = StateStore::new();
        let doomed = store.add(state(vec![2, 3]), 0);
        let kept = store.add(state(vec![2, -3]), 0);
        let pruned = store.remove_dead(&[vec![3]]);
        assert_eq!(pruned, 1);
        assert!(store.get(doomed).is_none());
        assert!(store.get(kept).is_some());
        // The cursor advances: a second sweep over the same constraints does
        // nothing.
        assert_eq!(store.remove_dead(&[vec![3]]), 0);
        assert_eq!(store.get(kept).unwrap().dead_cursor, 1);
    }

    #[test]
    fn anchors_are_not_bucketed() {
        let mut store = StateStore::new();
        let id = store.add_anchor(state(vec![-2]));
        assert_eq!(store.num_levels(), 0);
        assert!(store.get(id).is_some());
    }
}
