// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The shared literal vocabulary: signed-integer literals and var-ordered
//! cubes.
//!
//! A [`Cube`] is a conjunction of literals; negated pointwise it becomes a
//! [`Clause`] (a disjunction). Literal 0 is invalid. All cubes handled by the
//! engine are kept sorted by variable id so that subsumption is a single
//! merge walk.

use std::cmp::Ordering;

/// A literal: sign encodes polarity, magnitude encodes the variable id.
pub type Lit = i32;

/// A full variable assignment as reported by a solver, indexed by `var - 1`.
/// An entry is `var`, `-var`, or 0 when the solver left the variable
/// unassigned.
pub type Assignment = Vec<Lit>;

/// A conjunction of literals; a (possibly partial) state or assumption set.
pub type Cube = Vec<Lit>;

/// A disjunction of literals; a learned fact.
pub type Clause = Vec<Lit>;

/// The variable id of a literal.
#[inline]
pub fn var(lit: Lit) -> Lit {
    lit.abs()
}

/// Order literals by variable id, ignoring polarity.
#[inline]
pub fn var_cmp(a: &Lit, b: &Lit) -> Ordering {
    a.abs().cmp(&b.abs())
}

/// Sort a cube by variable id and drop duplicate literals.
pub fn sort_cube(cube: &mut Cube) {
    cube.sort_by(var_cmp);
    cube.dedup();
}

/// Whether the conjunction `stronger` implies the conjunction `weaker`, i.e.
/// every literal of `weaker` occurs in `stronger`. Both cubes must be
/// var-sorted.
pub fn implies(stronger: &[Lit], weaker: &[Lit]) -> bool {
    if stronger.len() < weaker.len() {
        return false;
    }
    let mut it = stronger.iter();
    'outer: for &w in weaker {
        for &s in it.by_ref() {
            match var_cmp(&w, &s) {
                Ordering::Less => return false,
                Ordering::Equal => {
                    if s != w {
                        return false;
                    }
                    continue 'outer;
                }
                Ordering::Greater => continue,
            }
        }
        return false;
    }
    true
}

/// The literals common to two var-sorted cubes.
pub fn intersect(a: &[Lit], b: &[Lit]) -> Cube {
    let mut res = Cube::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match var_cmp(&a[i], &b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if a[i] == b[j] {
                    res.push(a[i]);
                }
                i += 1;
                j += 1;
            }
        }
    }
    res
}

/// The pointwise negation of a cube, i.e. the clause blocking it.
pub fn negated(cube: &[Lit]) -> Clause {
    cube.iter().map(|&l| -l).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implies_is_ordered_containment() {
        assert!(implies(&[1, -2, 3], &[1, 3]));
        assert!(implies(&[1, -2, 3], &[-2]));
        assert!(implies(&[1, -2, 3], &[]));
        assert!(!implies(&[1, 3], &[1, -2, 3]));
        assert!(!implies(&[1, -2, 3], &[2]));
        assert!(!implies(&[1, -2, 3], &[4]));
    }

    #[test]
    fn intersect_keeps_agreeing_literals() {
        assert_eq!(intersect(&[1, -2, 3], &[1, 2, 3]), vec![1, 3]);
        assert_eq!(intersect(&[1, -2], &[3, 4]), Vec::<Lit>::new());
        assert_eq!(intersect(&[-5], &[-5]), vec![-5]);
    }

    #[test]
    fn sort_cube_orders_by_var() {
        let mut cu = vec![-7, 2, -3, 2];
        sort_cube(&mut cu);
        assert_eq!(cu, vec![2, -3, -7]);
    }

    #[test]
    fn negated_flips_polarities() {
        assert_eq!(negated(&[1, -2, 3]), vec![-1, 2, -3]);
    }
}
