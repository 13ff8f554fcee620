// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! End-to-end checks on small hand-written circuits.

use aig::TransitionSystem;
use reach::{CheckOptions, Checker, Traversal, Verdict};

/// One input, one latch taking the input's value, monitored output is the
/// latch. Reachable in one step with input 1.
const LATCH_FOLLOWS_INPUT: &[u8] = b"aag 2 1 1 1 0\n2\n4 2\n4\n";

/// One latch feeding itself, initialized to 0, monitored output is the
/// latch. Never reachable.
const STUCK_LATCH: &[u8] = b"aag 1 0 1 1 0\n2 2\n2\n";

/// Two latches counting 00 -> 01 -> 10 -> 11; the monitored output fires at
/// 11. Four reachable states, violation after three steps.
const COUNTER_TO_THREE: &[u8] = b"aag 6 0 2 1 4\n2 3\n4 11\n12\n6 4 3\n8 5 2\n10 7 9\n12 4 2\n";

/// Low latch toggles, high latch is stuck at 0; the monitored output needs
/// both high. Two reachable states, never reachable.
const SAFE_TOGGLE: &[u8] = b"aag 3 0 2 1 1\n2 3\n4 4\n6\n6 4 2\n";

fn system(src: &[u8]) -> TransitionSystem {
    TransitionSystem::new(&aig::parse(src).unwrap())
}

fn check_with(src: &[u8], opts: CheckOptions) -> Verdict {
    let sys = system(src);
    let mut checker = Checker::new(&sys, opts);
    let mut results = checker.check().unwrap();
    assert_eq!(results.len(), 1);
    results.pop().unwrap().verdict
}

fn witness_opts(forward: bool) -> CheckOptions {
    CheckOptions {
        forward,
        witness: true,
        ..CheckOptions::default()
    }
}

#[test]
fn one_step_violation_with_witness_backward() {
    let verdict = check_with(LATCH_FOLLOWS_INPUT, witness_opts(false));
    let Verdict::Violated { witness: Some(w) } = verdict else {
        panic!("expected a violation with witness, got {verdict:?}");
    };
    assert_eq!(w.latches, "0");
    assert_eq!(w.inputs, vec!["1"]);
}

#[test]
fn one_step_violation_with_witness_forward() {
    let verdict = check_with(LATCH_FOLLOWS_INPUT, witness_opts(true));
    let Verdict::Violated { witness: Some(w) } = verdict else {
        panic!("expected a violation with witness, got {verdict:?}");
    };
    assert_eq!(w.latches, "0");
    assert_eq!(w.inputs, vec!["1"]);
}

#[test]
fn unreachable_output_is_proved_safe() {
    for forward in [false, true] {
        let verdict = check_with(
            STUCK_LATCH,
            CheckOptions {
                forward,
                ..CheckOptions::default()
            },
        );
        let Verdict::Safe { frames } = verdict else {
            panic!("expected safe, got {verdict:?}");
        };
        // The single frame is already inductive.
        assert_eq!(frames, 1, "forward={forward}");
    }
}

#[test]
fn counter_reaches_the_monitored_state() {
    let verdict = check_with(COUNTER_TO_THREE, witness_opts(false));
    let Verdict::Violated { witness: Some(w) } = verdict else {
        panic!("expected a violation with witness, got {verdict:?}");
    };
    assert_eq!(w.latches, "00");
    // The circuit has no inputs and a deterministic transition, so the trace
    // is exactly the three steps 00 -> 01 -> 10 -> 11.
    assert_eq!(w.inputs, vec!["", "", ""]);
}

#[test]
fn safe_toggle_terminates_within_the_state_bound() {
    // Two reachable states: the outer loop may extend the frame sequence at
    // most N+1 = 3 times before the fixpoint appears.
    for forward in [false, true] {
        let verdict = check_with(
            SAFE_TOGGLE,
            CheckOptions {
                forward,
                ..CheckOptions::default()
            },
        );
        let Verdict::Safe { frames } = verdict else {
            panic!("expected safe, got {verdict:?}");
        };
        assert!(frames <= 3, "forward={forward}, frames={frames}");
    }
}

#[test]
fn dead_state_detection_never_changes_the_verdict() {
    for (src, expect_safe) in [
        (LATCH_FOLLOWS_INPUT, false),
        (STUCK_LATCH, true),
        (COUNTER_TO_THREE, false),
        (SAFE_TOGGLE, true),
    ] {
        for detect_dead in [false, true] {
            let verdict = check_with(
                src,
                CheckOptions {
                    detect_dead,
                    ..CheckOptions::default()
                },
            );
            assert_eq!(
                matches!(verdict, Verdict::Safe { .. }),
                expect_safe,
                "detect_dead={detect_dead}"
            );
        }
    }
}

#[test]
fn policy_toggles_agree_on_verdicts() {
    for (src, expect_safe) in [
        (LATCH_FOLLOWS_INPUT, false),
        (STUCK_LATCH, true),
        (SAFE_TOGGLE, true),
    ] {
        let variants = [
            CheckOptions {
                minimal_core: true,
                ..CheckOptions::default()
            },
            CheckOptions {
                intersection: true,
                ..CheckOptions::default()
            },
            CheckOptions {
                propagate: false,
                ..CheckOptions::default()
            },
            CheckOptions {
                traversal: Traversal::ShallowestFirst,
                ..CheckOptions::default()
            },
            CheckOptions {
                partial_state: true,
                ..CheckOptions::default()
            },
        ];
        for opts in variants {
            let desc = format!("{opts:?}");
            let verdict = check_with(src, opts);
            assert_eq!(
                matches!(verdict, Verdict::Safe { .. }),
                expect_safe,
                "options {desc}"
            );
        }
    }
}

#[test]
fn constant_outputs_answer_immediately() {
    // Output literal 1 is constant true: violated with a trivial witness.
    let sys = system(b"aag 1 0 1 1 0\n2 2\n1\n");
    let mut checker = Checker::new(
        &sys,
        CheckOptions {
            witness: true,
            ..CheckOptions::default()
        },
    );
    let results = checker.check().unwrap();
    let Verdict::Violated { witness: Some(w) } = &results[0].verdict else {
        panic!("expected trivial violation");
    };
    assert_eq!(w.latches, "0");
    assert_eq!(w.inputs, vec![""; 1]);

    // Output literal 0 is constant false: safe without any frames.
    let sys = system(b"aag 1 0 1 1 0\n2 2\n0\n");
    let mut checker = Checker::new(&sys, CheckOptions::default());
    let results = checker.check().unwrap();
    assert_eq!(results[0].verdict, Verdict::Safe { frames: 0 });
}

#[test]
fn every_output_gets_its_own_verdict() {
    // Two outputs over the toggle circuit: the low latch itself (reachable)
    // and the conjunction of both latches (unreachable).
    let sys = system(b"aag 3 0 2 2 1\n2 3\n4 4\n2\n6\n6 4 2\n");
    let mut checker = Checker::new(&sys, CheckOptions::default());
    let results = checker.check().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].output, 0);
    assert!(matches!(results[0].verdict, Verdict::Violated { .. }));
    assert_eq!(results[1].output, 1);
    assert!(matches!(results[1].verdict, Verdict::Safe { .. }));
}

#[test]
fn generalized_cores_still_refute_their_states() {
    // Frame 0 of the toggle circuit blocks successors 0x and x0. A state
    // refuted against it yields a core that is a subset of the state and
    // must re-refute on its own.
    use solver::TransitionSolver;
    let sys = system(SAFE_TOGGLE);
    let mut solver = TransitionSolver::new(&sys);
    solver.add_frame_clause(&sys, &[-1], 0, false);
    solver.add_frame_clause(&sys, &[-2], 0, false);

    solver.assume_state(&sys, &[1, -2], Some(0), false);
    assert!(!solver.solve().unwrap());
    let (core, constraint) = solver.conflict(&sys, false, true).unwrap();
    assert!(!constraint);
    assert!(!core.is_empty());
    assert!(aig::cube::implies(&[1, -2], &core));

    solver.assume_state(&sys, &core, Some(0), false);
    assert!(!solver.solve().unwrap());
}

#[test]
fn propagated_clauses_keep_excluding_their_states() {
    // The toggle circuit's high latch is stuck at 0, so the frame-0 clause
    // blocking successors with the high latch set holds one step later and
    // moves to frame 1.
    use solver::TransitionSolver;
    let sys = system(SAFE_TOGGLE);
    let mut solver = TransitionSolver::new(&sys);
    solver.add_frame_clause(&sys, &[2], 0, false);

    solver.assume_state(&sys, &[2], Some(0), false);
    assert!(!solver.solve().unwrap());
    solver.add_frame_clause(&sys, &[2], 1, false);

    // Both states the clause excluded at frame 0 stay unreachable as
    // successors under frame 1; the two it left alone stay reachable.
    for (state, excluded) in [
        (vec![1, 2], true),
        (vec![-1, 2], true),
        (vec![1, -2], false),
        (vec![-1, -2], false),
    ] {
        solver.assume_state(&sys, &state, Some(1), true);
        assert_eq!(solver.solve().unwrap(), !excluded, "state {state:?}");
    }
}
