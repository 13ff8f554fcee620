// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! The car-checker binary's command-line interface.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Instant;
use std::{fs, process};

use clap::Parser;

use aig::TransitionSystem;
use reach::{CheckOptions, Checker, PropertyResult, Traversal, Verdict};

/// Entrypoint for the car-checker binary: a complementary approximate
/// reachability checker for AIGER safety properties.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct App {
    #[arg(short, long)]
    /// Search from the monitored states toward the initial states
    /// (default: the other way around)
    forward: bool,

    #[arg(short = 'e', long)]
    /// Record and print witness traces for violated properties
    witness: bool,

    #[arg(long)]
    /// Disable clause propagation between outer iterations
    no_propagate: bool,

    #[arg(long)]
    /// Minimize unsat cores before learning clauses from them
    minimal_core: bool,

    #[arg(long)]
    /// Detect and prune states that can never reach the monitored condition
    dead: bool,

    #[arg(long)]
    /// Bias core generalization toward literals shared with earlier cores
    intersection: bool,

    #[arg(long)]
    /// Track partial states instead of full latch assignments
    partial: bool,

    #[arg(long)]
    /// Expand the shallowest unresolved state first instead of the deepest
    shallow_first: bool,

    #[arg(long)]
    /// Print statistics when done
    time: bool,

    #[arg(short, long)]
    /// Write the result to this file instead of stdout
    output: Option<PathBuf>,

    /// An AIGER file, ASCII (.aag) or binary (.aig)
    file: String,
}

impl App {
    fn options(&self) -> CheckOptions {
        CheckOptions {
            forward: self.forward,
            witness: self.witness,
            minimal_core: self.minimal_core,
            propagate: !self.no_propagate,
            detect_dead: self.dead,
            intersection: self.intersection,
            partial_state: self.partial,
            traversal: if self.shallow_first {
                Traversal::ShallowestFirst
            } else {
                Traversal::DeepestFirst
            },
        }
    }

    /// Run the application.
    pub fn exec(self) {
        let bytes = match fs::read(&self.file) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("could not read {}: {err}", self.file);
                process::exit(1);
            }
        };
        let circuit = match aig::parse(&bytes) {
            Ok(circuit) => circuit,
            Err(err) => {
                eprintln!("could not parse {}: {err}", self.file);
                process::exit(1);
            }
        };

        log::info!(
            "{}: {} inputs, {} latches, {} ands, {} outputs",
            self.file,
            circuit.inputs.len(),
            circuit.latches.len(),
            circuit.ands.len(),
            circuit.outputs.len()
        );
        let build = Instant::now();
        let sys = TransitionSystem::new(&circuit);
        let model_build = build.elapsed();
        let mut checker = Checker::new(&sys, self.options());
        let results = match checker.check() {
            Ok(results) => results,
            Err(err) => {
                eprintln!("oracle failure: {err}");
                process::exit(2);
            }
        };

        let report = render_results(&results);
        match &self.output {
            None => print!("{report}"),
            Some(path) => {
                if let Err(err) = fs::write(path, &report) {
                    eprintln!("could not write {}: {err}", path.display());
                    process::exit(1);
                }
            }
        }

        if self.time {
            let mut stats = checker.stats().clone();
            stats.model_build = model_build;
            println!("{stats}");
        }
    }
}

/// Render verdicts in the HWMCC result format: a status line, the property
/// index, witness lines for violations, and a terminating dot.
fn render_results(results: &[PropertyResult]) -> String {
    let mut out = String::new();
    for result in results {
        match &result.verdict {
            Verdict::Safe { .. } => {
                let _ = writeln!(out, "0\nb{}\n.", result.output);
            }
            Verdict::Violated { witness } => {
                let _ = writeln!(out, "1\nb{}", result.output);
                if let Some(witness) = witness {
                    let _ = writeln!(out, "{}", witness.latches);
                    for inputs in &witness.inputs {
                        let _ = writeln!(out, "{inputs}");
                    }
                }
                let _ = writeln!(out, ".");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reach::Witness;

    #[test]
    fn renders_hwmcc_result_blocks() {
        let results = vec![
            PropertyResult {
                output: 0,
                verdict: Verdict::Violated {
                    witness: Some(Witness {
                        latches: "0".to_string(),
                        inputs: vec!["1".to_string()],
                    }),
                },
            },
            PropertyResult {
                output: 1,
                verdict: Verdict::Safe { frames: 2 },
            },
        ];
        assert_eq!(render_results(&results), "1\nb0\n0\n1\n.\n0\nb1\n.\n");
    }
}
