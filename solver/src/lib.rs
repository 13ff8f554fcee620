// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Incremental SAT oracle sessions for the reachability engine, built over
//! the [CaDiCaL][cadical] solver.
//!
//! [cadical]: https://fmv.jku.at/cadical/

// configure clippy
#![allow(clippy::needless_return)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::type_complexity)]
// documentation-related lints (only checked when running rustdoc)
#![warn(missing_docs)]
#![allow(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod inv;
pub mod sat;
pub mod start;
pub mod transition;

pub use inv::InvSolver;
pub use sat::{SatSolver, SolverError};
pub use start::StartSolver;
pub use transition::TransitionSolver;
