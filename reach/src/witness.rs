// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Witness traces for violated properties: the initial latch assignment and
//! the input vector of every transition, oldest first.

use aig::cube::{Cube, Lit};

use crate::state::{StateId, StateStore};

/// A concrete trace from an initial state to the monitored condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    /// The initial latch assignment, one character per latch (`0`, `1`, or
    /// `x` for unconstrained).
    pub latches: String,
    /// One input vector per transition, oldest first. A violation of the
    /// initial state itself contributes the single input vector exhibiting
    /// it.
    pub inputs: Vec<String>,
}

impl Witness {
    /// The trace for a monitored condition that is constant true: the
    /// initial state under any input.
    pub fn trivial(init: &Cube, num_inputs: usize, num_latches: usize) -> Witness {
        Witness {
            latches: latch_line(init, num_inputs, num_latches),
            inputs: vec!["0".repeat(num_inputs)],
        }
    }

    /// Assemble a forward-search trace by following successor links from the
    /// initial anchor.
    pub fn forward(
        store: &StateStore,
        anchor: StateId,
        num_inputs: usize,
        num_latches: usize,
    ) -> Witness {
        let mut inputs = Vec::new();
        let mut latches = String::new();
        let mut cursor = Some(anchor);
        while let Some(id) = cursor {
            let Some(state) = store.get(id) else { break };
            if id == anchor {
                latches = latch_line(&state.latches, num_inputs, num_latches);
            }
            if state.next.is_some() || (id == anchor && !state.inputs.is_empty()) {
                inputs.push(input_line(&state.inputs, num_inputs));
            }
            cursor = state.next;
        }
        Witness { latches, inputs }
    }

    /// Assemble a backward-search trace by walking predecessor links from
    /// the violating state down to the initial state, then reversing.
    pub fn backward(
        store: &StateStore,
        anchor: StateId,
        num_inputs: usize,
        num_latches: usize,
    ) -> Witness {
        let mut inputs = Vec::new();
        let mut latches = String::new();
        let mut cursor = Some(anchor);
        while let Some(id) = cursor {
            let Some(state) = store.get(id) else { break };
            match state.prev {
                Some(prev) => {
                    inputs.push(input_line(&state.inputs, num_inputs));
                    cursor = Some(prev);
                }
                None => {
                    // The root is the initial state.
                    latches = latch_line(&state.latches, num_inputs, num_latches);
                    if inputs.is_empty() {
                        inputs.push(input_line(&state.last_inputs, num_inputs));
                    }
                    cursor = None;
                }
            }
        }
        inputs.reverse();
        Witness { latches, inputs }
    }
}

/// Render a var-sorted latch cube positionally; latches the cube leaves
/// unconstrained print as `x`.
fn latch_line(latches: &[Lit], num_inputs: usize, num_latches: usize) -> String {
    assignment_line(latches, num_inputs as Lit, num_latches, 'x')
}

/// Render an input cube positionally; missing inputs default to `0`.
fn input_line(inputs: &[Lit], num_inputs: usize) -> String {
    assignment_line(inputs, 0, num_inputs, '0')
}

fn assignment_line(cube: &[Lit], first_var_offset: Lit, count: usize, missing: char) -> String {
    let mut line = String::with_capacity(count);
    let mut j = 0;
    for i in 0..count {
        let var = first_var_offset + 1 + i as Lit;
        while j < cube.len() && cube[j].abs() < var {
            j += 1;
        }
        if j < cube.len() && cube[j].abs() == var {
            line.push(if cube[j] > 0 { '1' } else { '0' });
            j += 1;
        } else {
            line.push(missing);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{State, StateStore};

    #[test]
    fn latch_line_marks_unconstrained() {
        assert_eq!(latch_line(&[2, -4], 1, 3), "1x0");
        assert_eq!(latch_line(&[], 1, 2), "xx");
    }

    #[test]
    fn backward_trace_reverses_inputs() {
        let mut store = StateStore::new();
        let root = store.add_anchor(State {
            latches: vec![-2],
            ..State::default()
        });
        let mid = store.add_anchor(State {
            latches: vec![2],
            inputs: vec![1],
            prev: Some(root),
            ..State::default()
        });
        let last = store.add_anchor(State {
            latches: vec![2],
            inputs: vec![-1],
            prev: Some(mid),
            ..State::default()
        });
        let w = Witness::backward(&store, last, 1, 1);
        assert_eq!(w.latches, "0");
        assert_eq!(w.inputs, vec!["1", "0"]);
    }

    #[test]
    fn backward_trace_of_initial_violation_uses_last_inputs() {
        let mut store = StateStore::new();
        let only = store.add_anchor(State {
            latches: vec![-2],
            last_inputs: vec![1],
            ..State::default()
        });
        let w = Witness::backward(&store, only, 1, 1);
        assert_eq!(w.latches, "0");
        assert_eq!(w.inputs, vec!["1"]);
    }

    #[test]
    fn forward_trace_stops_before_final_state() {
        let mut store = StateStore::new();
        let bad = store.add_anchor(State {
            latches: vec![2],
            inputs: vec![-1],
            ..State::default()
        });
        let anchor = store.add_anchor(State {
            latches: vec![-2],
            inputs: vec![1],
            next: Some(bad),
            initial: true,
            ..State::default()
        });
        let w = Witness::forward(&store, anchor, 1, 1);
        assert_eq!(w.latches, "0");
        assert_eq!(w.inputs, vec!["1"]);
    }
}
