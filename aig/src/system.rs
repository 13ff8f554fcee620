// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The transition-relation model a checker runs against.
//!
//! Variable ids partition the space: inputs are `1..=num_inputs`, latches
//! are `num_inputs+1..=num_inputs+num_latches`, and everything above belongs
//! to gates and engine-created activation variables. Two ids above the AIGER
//! maximum stand for the constants TRUE and FALSE.
//!
//! The CNF encoding keeps three clause sections in order: constraint clauses
//! (latch-alias equalities and learned permanent constraints), clauses in the
//! cone of the monitored outputs, and clauses in the cone of the latch
//! next-state functions. Solver sessions pick the prefix they need.

use fxhash::{FxHashMap, FxHashSet};

use crate::cube::{negated, Clause, Cube, Lit};
use crate::parser::Aig;

/// A Boolean circuit lowered to CNF, with the latch next-state maps the
/// search engine needs.
#[derive(Debug, Clone)]
pub struct TransitionSystem {
    num_inputs: usize,
    num_latches: usize,
    max_id: Lit,
    true_id: Lit,
    false_id: Lit,
    init: Cube,
    outputs: Vec<Lit>,
    cls: Vec<Clause>,
    outputs_start: usize,
    latches_start: usize,
    next_map: FxHashMap<Lit, Lit>,
    reverse_next_map: FxHashMap<Lit, Vec<Lit>>,
    trues: FxHashSet<u32>,
    constraint_flag: Lit,
}

impl TransitionSystem {
    /// Lower a parsed circuit. The circuit must be reencoded (the parser
    /// guarantees this).
    pub fn new(aig: &Aig) -> TransitionSystem {
        let max_id = aig.max_var as Lit + 2;
        let mut sys = TransitionSystem {
            num_inputs: aig.inputs.len(),
            num_latches: aig.latches.len(),
            max_id,
            true_id: max_id - 1,
            false_id: max_id,
            init: Cube::new(),
            outputs: Vec::new(),
            cls: Vec::new(),
            outputs_start: 0,
            latches_start: 0,
            next_map: FxHashMap::default(),
            reverse_next_map: FxHashMap::default(),
            trues: FxHashSet::default(),
            constraint_flag: 0,
        };
        sys.collect_trues(aig);
        sys.set_outputs(aig);
        sys.set_init(aig);
        sys.create_next_maps(aig);
        sys.create_clauses(aig);
        log::debug!(
            "model: {} inputs, {} latches, {} outputs, {} clauses, max id {}",
            sys.num_inputs,
            sys.num_latches,
            sys.outputs.len(),
            sys.cls.len(),
            sys.max_id
        );
        sys
    }

    /// Number of input variables.
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of latch (state) variables.
    pub fn num_latches(&self) -> usize {
        self.num_latches
    }

    /// Number of monitored outputs.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The monitored literal for output `i`.
    pub fn output(&self, i: usize) -> Lit {
        self.outputs[i]
    }

    /// Largest variable id used by the encoding; activation variables created
    /// by solver sessions start above this.
    pub fn max_id(&self) -> Lit {
        self.max_id
    }

    /// The id standing for constant TRUE.
    pub fn true_id(&self) -> Lit {
        self.true_id
    }

    /// The id standing for constant FALSE.
    pub fn false_id(&self) -> Lit {
        self.false_id
    }

    /// The initial-state cube (one literal per latch, var-sorted).
    pub fn init(&self) -> &Cube {
        &self.init
    }

    /// All CNF clauses, constraint section first.
    pub fn clauses(&self) -> &[Clause] {
        &self.cls
    }

    /// Index of the first clause in the output cone.
    pub fn outputs_start(&self) -> usize {
        self.outputs_start
    }

    /// Index of the first clause in the latch cone.
    pub fn latches_start(&self) -> usize {
        self.latches_start
    }

    /// Whether `id` is an input or latch variable.
    pub fn state_var(&self, id: Lit) -> bool {
        id >= 1 && id <= (self.num_inputs + self.num_latches) as Lit
    }

    /// Whether `id` is a latch variable.
    pub fn latch_var(&self, id: Lit) -> bool {
        id > self.num_inputs as Lit && id <= (self.num_inputs + self.num_latches) as Lit
    }

    /// The next-state literal of a latch literal, or 0 if `lit` has none.
    pub fn prime(&self, lit: Lit) -> Lit {
        match self.next_map.get(&lit.abs()) {
            Some(&next) => {
                if lit > 0 {
                    next
                } else {
                    -next
                }
            }
            None => 0,
        }
    }

    /// The latch literals whose next-state literal is `lit`; empty if none.
    pub fn previous(&self, lit: Lit) -> Vec<Lit> {
        match self.reverse_next_map.get(&lit.abs()) {
            Some(vars) => {
                if lit > 0 {
                    vars.clone()
                } else {
                    vars.iter().map(|&v| -v).collect()
                }
            }
            None => Vec::new(),
        }
    }

    /// Map an unsat core over next-state variables back to the latch literals
    /// feeding them. Returns whether every literal mapped; if so the core is
    /// frame-independent and can be learned as a permanent constraint.
    pub fn shrink_to_previous_vars(&self, cu: &mut Cube) -> bool {
        let mut constraint = true;
        let mut tmp = Cube::new();
        for &l in cu.iter() {
            let ids = self.previous(l.abs());
            if ids.is_empty() {
                constraint = false;
                continue;
            }
            for id in ids {
                tmp.push(if l > 0 { id } else { -id });
            }
        }
        *cu = tmp;
        constraint
    }

    /// Restrict an unsat core to latch variables. Returns whether nothing was
    /// dropped (the permanent-constraint condition, as above).
    pub fn shrink_to_latch_vars(&self, cu: &mut Cube) -> bool {
        let mut constraint = true;
        cu.retain(|&l| {
            let keep = self.latch_var(l.abs());
            constraint &= keep;
            keep
        });
        constraint
    }

    /// Add a learned permanent constraint cube to the encoding. The blocking
    /// clause is guarded so the initial state stays exempt, and the guard
    /// literal is appended to `cu` so callers push the same guarded clause
    /// into live solver sessions.
    pub fn update_constraint(&mut self, cu: &mut Cube) {
        let mut clause = negated(cu);
        clause.push(-self.constraint_flag);
        self.cls.insert(0, clause);
        self.outputs_start += 1;
        self.latches_start += 1;
        cu.push(self.constraint_flag);
    }

    fn is_true(&self, id: u32) -> bool {
        id == 1 || self.trues.contains(&id)
    }

    fn is_false(&self, id: u32) -> bool {
        id == 0 || self.trues.contains(&(id ^ 1))
    }

    fn lit_of(&self, id: u32) -> Lit {
        debug_assert!(id > 1);
        if id % 2 == 0 {
            (id / 2) as Lit
        } else {
            -((id / 2) as Lit)
        }
    }

    /// Constant gates: a gate of two true operands is true, a gate with a
    /// false operand is false. Gates are topologically ordered so one pass
    /// suffices.
    fn collect_trues(&mut self, aig: &Aig) {
        for gate in &aig.ands {
            debug_assert!(gate.lhs % 2 == 0);
            if self.is_true(gate.rhs0) && self.is_true(gate.rhs1) {
                self.trues.insert(gate.lhs);
            } else if self.is_false(gate.rhs0) || self.is_false(gate.rhs1) {
                self.trues.insert(gate.lhs + 1);
            }
        }
    }

    fn set_outputs(&mut self, aig: &Aig) {
        for &lit in &aig.outputs {
            let out = if self.is_true(lit) {
                self.true_id
            } else if self.is_false(lit) {
                self.false_id
            } else {
                self.lit_of(lit)
            };
            self.outputs.push(out);
        }
    }

    fn set_init(&mut self, aig: &Aig) {
        for (i, latch) in aig.latches.iter().enumerate() {
            let var = (self.num_inputs + 1 + i) as Lit;
            self.init
                .push(if latch.reset == 0 { -var } else { var });
        }
    }

    fn create_next_maps(&mut self, aig: &Aig) {
        for (i, latch) in aig.latches.iter().enumerate() {
            let var = (latch.lit / 2) as Lit;
            debug_assert_eq!(var, (self.num_inputs + 1 + i) as Lit);
            let next = if self.is_false(latch.next) {
                self.false_id
            } else if self.is_true(latch.next) {
                self.true_id
            } else {
                self.lit_of(latch.next)
            };
            self.next_map.insert(var, next);
            self.reverse_next_map
                .entry(next.abs())
                .or_default()
                .push(if next > 0 { var } else { -var });
        }
    }

    fn create_clauses(&mut self, aig: &Aig) {
        let gates: FxHashMap<u32, (u32, u32)> = aig
            .ands
            .iter()
            .map(|g| (g.lhs, (g.rhs0, g.rhs1)))
            .collect();
        let mut seen = FxHashSet::default();

        // Constraint section. AIGER 1.9 invariant constraints are not read,
        // so only the latch-alias constraints land here; learned permanent
        // constraints are prepended later.
        self.create_constraints_for_latches();
        self.outputs_start = self.cls.len();

        let output_roots: Vec<u32> = aig.outputs.clone();
        self.add_cone(&gates, &mut seen, &output_roots);
        self.latches_start = self.cls.len();

        let latch_roots: Vec<u32> = aig.latches.iter().map(|l| l.next).collect();
        self.add_cone(&gates, &mut seen, &latch_roots);

        self.cls.push(vec![self.true_id]);
        self.cls.push(vec![-self.false_id]);
    }

    /// Add the clauses of every gate in the cone of influence of `roots`
    /// that has not been added yet.
    fn add_cone(
        &mut self,
        gates: &FxHashMap<u32, (u32, u32)>,
        seen: &mut FxHashSet<u32>,
        roots: &[u32],
    ) {
        let mut stack: Vec<u32> = Vec::new();
        for &root in roots {
            if !self.is_true(root) && !self.is_false(root) {
                stack.push(root & !1);
            }
        }
        while let Some(id) = stack.pop() {
            let Some(&(rhs0, rhs1)) = gates.get(&id) else {
                continue; // input or latch variable
            };
            if !seen.insert(id) {
                continue;
            }
            self.add_gate_clauses(id, rhs0, rhs1);
            for rhs in [rhs0, rhs1] {
                if !self.is_true(rhs) && !self.is_false(rhs) {
                    stack.push(rhs & !1);
                }
            }
        }
    }

    fn add_gate_clauses(&mut self, lhs: u32, rhs0: u32, rhs1: u32) {
        debug_assert!(!self.is_true(lhs) && !self.is_false(lhs));
        let l = self.lit_of(lhs);
        if self.is_true(rhs0) {
            let r = self.lit_of(rhs1);
            self.cls.push(vec![l, -r]);
            self.cls.push(vec![-l, r]);
        } else if self.is_true(rhs1) {
            let r = self.lit_of(rhs0);
            self.cls.push(vec![l, -r]);
            self.cls.push(vec![-l, r]);
        } else {
            let r0 = self.lit_of(rhs0);
            let r1 = self.lit_of(rhs1);
            self.cls.push(vec![l, -r0, -r1]);
            self.cls.push(vec![-l, r0]);
            self.cls.push(vec![-l, r1]);
        }
    }

    /// Latches sharing one next-state literal must agree in every state the
    /// transition relation produces, but not in the initial state. The
    /// equalities go under one guard flag, the initial cube under a second,
    /// and one of the two guards must hold.
    fn create_constraints_for_latches(&mut self) {
        self.max_id += 1;
        let flag1 = self.max_id;
        self.max_id += 1;
        let flag2 = self.max_id;
        self.constraint_flag = flag1;

        let mut keys: Vec<Lit> = self.reverse_next_map.keys().copied().collect();
        keys.sort_unstable();
        let mut exist = false;
        for key in keys {
            let vars = self.reverse_next_map[&key].clone();
            if vars.len() <= 1 {
                continue;
            }
            for pair in vars.windows(2) {
                exist = true;
                self.cls.push(vec![pair[0], -pair[1], -flag1]);
                self.cls.push(vec![-pair[0], pair[1], -flag1]);
            }
        }
        if !exist {
            // Keep flag1 mentioned so the solver treats it as a variable, not
            // a unit.
            self.max_id += 1;
            self.cls.push(vec![self.max_id, -flag1]);
        }
        for &l in &self.init.clone() {
            self.cls.push(vec![l, -flag2]);
        }
        self.cls.push(vec![flag1, flag2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn single_latch() -> TransitionSystem {
        // One input, one latch taking the input's value, output is the latch.
        let aig = parse(b"aag 2 1 1 1 0\n2\n4 2\n4\n").unwrap();
        TransitionSystem::new(&aig)
    }

    #[test]
    fn partitions_variables() {
        let sys = single_latch();
        assert_eq!(sys.num_inputs(), 1);
        assert_eq!(sys.num_latches(), 1);
        assert!(sys.state_var(1));
        assert!(sys.state_var(2));
        assert!(!sys.latch_var(1));
        assert!(sys.latch_var(2));
        assert!(!sys.state_var(3));
        assert_eq!(sys.init(), &vec![-2]);
        assert_eq!(sys.output(0), 2);
    }

    #[test]
    fn prime_and_previous_invert() {
        let sys = single_latch();
        assert_eq!(sys.prime(2), 1);
        assert_eq!(sys.prime(-2), -1);
        assert_eq!(sys.previous(1), vec![2]);
        assert_eq!(sys.previous(-1), vec![-2]);
        assert_eq!(sys.prime(1), 0);
        assert!(sys.previous(2).is_empty());
    }

    #[test]
    fn constant_output_is_mapped() {
        // Output literal 1 is constant true.
        let aig = parse(b"aag 1 0 1 1 0\n2 2\n1\n").unwrap();
        let sys = TransitionSystem::new(&aig);
        assert_eq!(sys.output(0), sys.true_id());
        let aig = parse(b"aag 1 0 1 1 0\n2 2\n0\n").unwrap();
        let sys = TransitionSystem::new(&aig);
        assert_eq!(sys.output(0), sys.false_id());
    }

    #[test]
    fn constant_gates_propagate() {
        // Gate 4 = 1 & 1 is constant true, gate 6 = 4 & 2 copies the input.
        let aig = parse(b"aag 3 1 0 1 2\n2\n6\n4 1 1\n6 4 2\n").unwrap();
        let sys = TransitionSystem::new(&aig);
        // Gate 6's clauses use the equivalence form.
        assert!(sys
            .clauses()
            .iter()
            .any(|c| c == &vec![3, -1] || c == &vec![-3, 1]));
    }

    #[test]
    fn clause_sections_are_ordered() {
        let sys = single_latch();
        assert!(sys.outputs_start() <= sys.latches_start());
        assert!(sys.latches_start() <= sys.clauses().len());
        // TRUE/FALSE units close the clause list.
        let n = sys.clauses().len();
        assert_eq!(sys.clauses()[n - 2], vec![sys.true_id()]);
        assert_eq!(sys.clauses()[n - 1], vec![-sys.false_id()]);
    }

    #[test]
    fn shrink_to_latch_vars_detects_constraints() {
        let sys = single_latch();
        let mut cu = vec![-2];
        assert!(sys.shrink_to_latch_vars(&mut cu));
        assert_eq!(cu, vec![-2]);
        let mut cu = vec![1, -2];
        assert!(!sys.shrink_to_latch_vars(&mut cu));
        assert_eq!(cu, vec![-2]);
    }

    #[test]
    fn shrink_to_previous_vars_maps_back() {
        let sys = single_latch();
        // Input var 1 is the next-state of latch 2.
        let mut cu = vec![-1];
        assert!(sys.shrink_to_previous_vars(&mut cu));
        assert_eq!(cu, vec![-2]);
        // The latch var itself has no preimage.
        let mut cu = vec![2];
        assert!(!sys.shrink_to_previous_vars(&mut cu));
        assert!(cu.is_empty());
    }

    #[test]
    fn update_constraint_prepends_guarded_clause() {
        let mut sys = single_latch();
        let before = sys.clauses().len();
        let outputs_start = sys.outputs_start();
        let mut cu = vec![2];
        sys.update_constraint(&mut cu);
        assert_eq!(sys.clauses().len(), before + 1);
        assert_eq!(sys.outputs_start(), outputs_start + 1);
        // The guard literal was appended for the solver sessions.
        assert_eq!(cu.len(), 2);
        assert_eq!(sys.clauses()[0][0], -2);
        assert_eq!(sys.clauses()[0][1], -cu[1]);
    }

    #[test]
    fn latch_aliases_get_equality_constraints() {
        // Two latches share next-state input 2.
        let aig = parse(b"aag 3 1 2 1 0\n2\n4 2\n6 2\n4\n").unwrap();
        let sys = TransitionSystem::new(&aig);
        assert_eq!(sys.previous(1), vec![2, 3]);
        let flag = sys.constraint_flag;
        assert!(sys
            .clauses()
            .iter()
            .any(|c| c == &vec![2, -3, -flag]));
        assert!(sys
            .clauses()
            .iter()
            .any(|c| c == &vec![-2, 3, -flag]));
    }
}
