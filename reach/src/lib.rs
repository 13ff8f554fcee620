// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Complementary approximate reachability: a frame-based, SAT-driven search
//! for violations of circuit safety properties, with inductive proofs on the
//! unreachable side.

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod checker;
pub mod config;
pub mod frames;
pub mod state;
pub mod stats;
pub mod witness;

pub use checker::{Checker, PropertyResult, Verdict};
pub use config::{CheckOptions, Traversal};
pub use solver::SolverError;
pub use stats::Stats;
pub use witness::Witness;
