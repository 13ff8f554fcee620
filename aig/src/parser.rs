// Copyright 2022-2023 VMware, Inc.
// SPDX-License-Identifier: BSD-2-Clause

//! Readers for the AIGER circuit format, both the ASCII (`aag`) and the
//! binary (`aig`) encodings.
//!
//! Only reencoded circuits are accepted: input literals must be
//! `2, 4, ..., 2I` and latch literals must follow them contiguously, which
//! is what `aiger_reencode` guarantees and what the variable partition of
//! [`crate::system::TransitionSystem`] relies on.

use thiserror::Error;

/// Ways reading an AIGER file can fail.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The file does not start with an `aag`/`aig` header.
    #[error("missing AIGER header")]
    MissingHeader,
    /// The header is present but malformed.
    #[error("malformed AIGER header: {0}")]
    BadHeader(String),
    /// A line in the body could not be parsed.
    #[error("malformed AIGER line {line}: {msg}")]
    BadLine {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        msg: String,
    },
    /// The circuit is not reencoded (inputs/latches out of place).
    #[error("circuit is not reencoded: literal {0} out of place")]
    NotReencoded(u32),
    /// A latch with a non-constant reset value.
    #[error("unsupported reset value {reset} for latch {lit}")]
    UnsupportedReset {
        /// The latch literal.
        lit: u32,
        /// The offending reset value.
        reset: u32,
    },
    /// The binary gate section ended early.
    #[error("truncated binary and-gate section")]
    TruncatedGates,
}

/// A latch declaration: current-state literal, next-state literal, and the
/// reset value (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latch {
    /// Current-state literal (always even).
    pub lit: u32,
    /// Next-state literal.
    pub next: u32,
    /// Reset value, 0 or 1.
    pub reset: u32,
}

/// An and gate `lhs = rhs0 & rhs1` over AIGER literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndGate {
    /// Defined literal (always even).
    pub lhs: u32,
    /// First operand.
    pub rhs0: u32,
    /// Second operand.
    pub rhs1: u32,
}

/// A raw AIGER circuit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aig {
    /// Maximum variable index.
    pub max_var: u32,
    /// Input literals.
    pub inputs: Vec<u32>,
    /// Latches in declaration order.
    pub latches: Vec<Latch>,
    /// Output literals (the monitored conditions).
    pub outputs: Vec<u32>,
    /// And gates in declaration order.
    pub ands: Vec<AndGate>,
}

/// Read a circuit from the bytes of an `aag` or `aig` file, dispatching on
/// the header magic.
pub fn parse(bytes: &[u8]) -> Result<Aig, ParseError> {
    if bytes.starts_with(b"aag ") {
        parse_ascii(bytes)
    } else if bytes.starts_with(b"aig ") {
        parse_binary(bytes)
    } else {
        Err(ParseError::MissingHeader)
    }
}

struct Header {
    max_var: u32,
    inputs: usize,
    latches: usize,
    outputs: usize,
    ands: usize,
}

fn parse_header(line: &str) -> Result<Header, ParseError> {
    let bad = |msg: &str| ParseError::BadHeader(msg.to_string());
    let mut fields = line.split_ascii_whitespace();
    fields.next(); // magic
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| bad(&format!("missing {name}")))?
            .parse::<u32>()
            .map_err(|_| bad(&format!("bad {name}")))
    };
    let header = Header {
        max_var: next("M")?,
        inputs: next("I")? as usize,
        latches: next("L")? as usize,
        outputs: next("O")? as usize,
        ands: next("A")? as usize,
    };
    if fields.next().is_some() {
        // Extended (AIGER 1.9) headers with bad/constraint/justice sections
        // are out of scope.
        return Err(bad("extended header sections are not supported"));
    }
    if header.max_var as usize != header.inputs + header.latches + header.ands {
        return Err(bad("M != I + L + A"));
    }
    Ok(header)
}

fn parse_reset(lit: u32, reset: Option<&str>, line: usize) -> Result<u32, ParseError> {
    match reset {
        None => Ok(0),
        Some(s) => {
            let r = s.parse::<u32>().map_err(|_| ParseError::BadLine {
                line,
                msg: "bad reset value".to_string(),
            })?;
            if r > 1 {
                return Err(ParseError::UnsupportedReset { lit, reset: r });
            }
            Ok(r)
        }
    }
}

fn parse_ascii(bytes: &[u8]) -> Result<Aig, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines().enumerate();
    let (_, header_line) = lines.next().ok_or(ParseError::MissingHeader)?;
    let header = parse_header(header_line)?;

    let mut next_line = |what: &str| -> Result<(usize, Vec<u32>), ParseError> {
        let (n, line) = lines.next().ok_or(ParseError::BadLine {
            line: 0,
            msg: format!("unexpected end of file in {what} section"),
        })?;
        let fields = line
            .split_ascii_whitespace()
            .map(|f| {
                f.parse::<u32>().map_err(|_| ParseError::BadLine {
                    line: n + 1,
                    msg: format!("bad literal in {what} section"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((n + 1, fields))
    };

    let mut aig = Aig {
        max_var: header.max_var,
        ..Aig::default()
    };

    for i in 0..header.inputs {
        let (n, fields) = next_line("input")?;
        match fields[..] {
            [lit] => {
                if lit != 2 * (i as u32 + 1) {
                    return Err(ParseError::NotReencoded(lit));
                }
                aig.inputs.push(lit);
            }
            _ => {
                return Err(ParseError::BadLine {
                    line: n,
                    msg: "expected one literal".to_string(),
                })
            }
        }
    }

    for i in 0..header.latches {
        let (n, fields) = next_line("latch")?;
        let (lit, next, reset) = match fields[..] {
            [lit, next] => (lit, next, None),
            [lit, next, reset] => (lit, next, Some(reset)),
            _ => {
                return Err(ParseError::BadLine {
                    line: n,
                    msg: "expected latch literal and next literal".to_string(),
                })
            }
        };
        if lit != 2 * (header.inputs + i + 1) as u32 {
            return Err(ParseError::NotReencoded(lit));
        }
        let reset = match reset {
            None => 0,
            Some(r) if r <= 1 => r,
            Some(r) => return Err(ParseError::UnsupportedReset { lit, reset: r }),
        };
        aig.latches.push(Latch { lit, next, reset });
    }

    for _ in 0..header.outputs {
        let (n, fields) = next_line("output")?;
        match fields[..] {
            [lit] => aig.outputs.push(lit),
            _ => {
                return Err(ParseError::BadLine {
                    line: n,
                    msg: "expected one literal".to_string(),
                })
            }
        }
    }

    for _ in 0..header.ands {
        let (n, fields) = next_line("and")?;
        match fields[..] {
            [lhs, rhs0, rhs1] => {
                if lhs % 2 != 0 || lhs / 2 > header.max_var {
                    return Err(ParseError::BadLine {
                        line: n,
                        msg: format!("bad gate literal {lhs}"),
                    });
                }
                aig.ands.push(AndGate { lhs, rhs0, rhs1 });
            }
            _ => {
                return Err(ParseError::BadLine {
                    line: n,
                    msg: "expected three literals".to_string(),
                })
            }
        }
    }

    // Symbol table and comments are ignored.
    Ok(aig)
}

fn parse_binary(bytes: &[u8]) -> Result<Aig, ParseError> {
    let mut pos = 0;

    let mut read_line = |line: &mut usize| -> Result<String, ParseError> {
        let start = pos;
        while pos < bytes.len() && bytes[pos] != b'\n' {
            pos += 1;
        }
        if pos >= bytes.len() {
            return Err(ParseError::BadLine {
                line: *line,
                msg: "unexpected end of file".to_string(),
            });
        }
        let s = String::from_utf8_lossy(&bytes[start..pos]).into_owned();
        pos += 1;
        *line += 1;
        Ok(s)
    };

    let mut line = 1;
    let header = parse_header(&read_line(&mut line)?)?;
    let mut aig = Aig {
        max_var: header.max_var,
        inputs: (1..=header.inputs as u32).map(|i| 2 * i).collect(),
        ..Aig::default()
    };

    for i in 0..header.latches {
        let lit = 2 * (header.inputs + i + 1) as u32;
        let text = read_line(&mut line)?;
        let mut fields = text.split_ascii_whitespace();
        let next = fields
            .next()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or(ParseError::BadLine {
                line: line - 1,
                msg: "bad latch next literal".to_string(),
            })?;
        let reset = parse_reset(lit, fields.next(), line - 1)?;
        aig.latches.push(Latch { lit, next, reset });
    }

    for _ in 0..header.outputs {
        let text = read_line(&mut line)?;
        let lit = text
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseError::BadLine {
                line: line - 1,
                msg: "bad output literal".to_string(),
            })?;
        aig.outputs.push(lit);
    }

    // And gates are delta-coded: for the i-th gate, lhs is implicit and the
    // two operands are recovered from varint-encoded differences.
    let mut read_delta = || -> Result<u32, ParseError> {
        let mut delta: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = *bytes.get(pos).ok_or(ParseError::TruncatedGates)?;
            pos += 1;
            delta |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(delta);
            }
            shift += 7;
        }
    };

    for i in 0..header.ands {
        let lhs = 2 * (header.inputs + header.latches + i + 1) as u32;
        let delta0 = read_delta()?;
        let delta1 = read_delta()?;
        let rhs0 = lhs
            .checked_sub(delta0)
            .ok_or(ParseError::TruncatedGates)?;
        let rhs1 = rhs0
            .checked_sub(delta1)
            .ok_or(ParseError::TruncatedGates)?;
        aig.ands.push(AndGate { lhs, rhs0, rhs1 });
    }

    Ok(aig)
}
