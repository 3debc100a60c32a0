//! Synthetic memory-access trace generation
//!
//! Produces the ordered access sequences fed to the simulator binary:
//!
//! - **Sequential**: a linear sweep from `start_addr` to `end_addr`; each
//!   repeat round shifts both bounds past the previous footprint so no round
//!   re-touches an address.
//! - **Pointer-chasing**: a random single-cycle permutation (a derangement)
//!   over the slot array, walked from slot 0. Every slot is visited exactly
//!   once per round and the chain has no cycle shorter than the array, which
//!   defeats prefetchers and measures load-to-use latency.
//! - **Overwrite**: repeated writes cycling through a handful of cache lines
//!   to probe worst-case overwrite/eviction latency.
//!
//! Wire format is one record per line: a 10-character zero-padded hex
//! address, an opcode (`R`, `W`, or `C` for a critical read), and an optional
//! `:idle` suffix that is omitted entirely when the idle gap is zero. Parsing
//! a written trace reproduces the original record sequence byte-exactly.
//!
//! All randomness comes through an explicitly passed [`rand::Rng`], so
//! generation is reproducible under a fixed seed and race-free when suites
//! generate in parallel.

use std::fmt;
use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MedirError, Result};

/// Cache-line stride (bytes) used by the overwrite pattern
pub const CACHE_LINE_BYTES: u64 = 64;

/// Default overwrite working-set size in bytes (4 cache lines)
pub const OVERWRITE_LINE_SIZE: u64 = 256;

// ============================================================================
// Access records
// ============================================================================

/// Operation code of one access record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessOp {
    /// Plain read (wire code `R`)
    Read,
    /// Write (wire code `W`)
    Write,
    /// Critical read: a load that blocks dependent work (wire code `C`)
    CriticalRead,
}

impl AccessOp {
    /// Wire code for this operation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "R",
            Self::Write => "W",
            Self::CriticalRead => "C",
        }
    }

    /// Parse a wire code
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "R" => Some(Self::Read),
            "W" => Some(Self::Write),
            "C" => Some(Self::CriticalRead),
            _ => None,
        }
    }
}

impl fmt::Display for AccessOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access kind a caller may request for a whole trace
///
/// Critical reads are never requested directly; they are derived from
/// `critical_load` on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// Read accesses
    Read,
    /// Write accesses
    Write,
}

impl AccessKind {
    /// Parse a user-supplied kind string (`r`/`R` or `w`/`W`)
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::InvalidAccessKind`] for anything else; no
    /// partial trace is ever written for an invalid kind.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "r" | "R" | "read" => Ok(Self::Read),
            "w" | "W" | "write" => Ok(Self::Write),
            other => Err(MedirError::InvalidAccessKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Address pattern of a generated trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrPattern {
    /// Linear sweep with a fixed step
    Sequential,
    /// Derangement-chain traversal
    PointerChasing,
}

impl AddrPattern {
    /// Name used in CLI arguments and cache paths
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "seq",
            Self::PointerChasing => "ptr-chasing",
        }
    }

    /// Parse a pattern name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seq" | "sequential" => Some(Self::Sequential),
            "ptr-chasing" | "ptr_chasing" => Some(Self::PointerChasing),
            _ => None,
        }
    }
}

impl fmt::Display for AddrPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One memory access: address, operation, optional idle gap before the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Byte address of the access
    pub addr: u64,
    /// Operation code
    pub op: AccessOp,
    /// Idle cycles inserted after this access; 0 means no suffix on the wire
    pub idle_cycles: u64,
}

impl AccessRecord {
    /// Record with no idle gap
    #[must_use]
    pub fn new(addr: u64, op: AccessOp) -> Self {
        Self {
            addr,
            op,
            idle_cycles: 0,
        }
    }

    /// Record with an idle gap after the access
    #[must_use]
    pub fn with_idle(addr: u64, op: AccessOp, idle_cycles: u64) -> Self {
        Self {
            addr,
            op,
            idle_cycles,
        }
    }

    /// Parse one wire line (without trailing newline)
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::ParseFailure`] on a malformed address, opcode,
    /// or idle suffix.
    pub fn parse_line(line: &str) -> Result<Self> {
        let malformed = |reason: &str| MedirError::ParseFailure {
            context: format!("trace line '{line}'"),
            reason: reason.to_string(),
        };

        let mut fields = line.split_whitespace();
        let addr_str = fields.next().ok_or_else(|| malformed("empty line"))?;
        let op_str = fields.next().ok_or_else(|| malformed("missing opcode"))?;
        if fields.next().is_some() {
            return Err(malformed("trailing fields"));
        }

        let hex = addr_str
            .strip_prefix("0x")
            .ok_or_else(|| malformed("address must be 0x-prefixed hex"))?;
        let addr =
            u64::from_str_radix(hex, 16).map_err(|e| malformed(&format!("bad address: {e}")))?;

        let (code, idle_cycles) = match op_str.split_once(':') {
            Some((code, idle)) => {
                let idle: u64 = idle
                    .parse()
                    .map_err(|e| malformed(&format!("bad idle suffix: {e}")))?;
                (code, idle)
            }
            None => (op_str, 0),
        };
        let op = AccessOp::parse(code).ok_or_else(|| malformed("unknown opcode"))?;

        Ok(Self {
            addr,
            op,
            idle_cycles,
        })
    }
}

impl fmt::Display for AccessRecord {
    /// Wire form: `{addr:#010x} {op}` plus `:{idle}` only when non-zero
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x} {}", self.addr, self.op)?;
        if self.idle_cycles != 0 {
            write!(f, ":{}", self.idle_cycles)?;
        }
        Ok(())
    }
}

/// Render a record sequence in wire format, one line per record
#[must_use]
pub fn format_trace(records: &[AccessRecord]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(records.len() * 14);
    for record in records {
        // infallible on String
        let _ = writeln!(out, "{record}");
    }
    out
}

/// Parse a whole trace file body back into records
///
/// Round-trip guarantee: `parse_trace(&format_trace(r)) == r` for every
/// synthesizable sequence, including presence/absence of idle suffixes.
///
/// # Errors
///
/// Returns [`MedirError::ParseFailure`] on the first malformed line.
pub fn parse_trace(content: &str) -> Result<Vec<AccessRecord>> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(AccessRecord::parse_line)
        .collect()
}

/// Write a record sequence to `path` in wire format
///
/// # Errors
///
/// Returns [`MedirError::IoError`] if the file cannot be written.
pub fn write_trace(path: &Path, records: &[AccessRecord]) -> Result<()> {
    fs::write(path, format_trace(records)).map_err(|e| MedirError::IoError {
        message: format!("failed to write trace {}: {e}", path.display()),
    })
}

// ============================================================================
// Trace synthesis
// ============================================================================

/// Parameters of one synthetic trace
///
/// Build with [`TraceRequest::sequential`] or
/// [`TraceRequest::pointer_chasing`]; pointer-chasing defaults to critical
/// loads because the pattern exists to measure blocking load-to-use latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRequest {
    /// First address of round 0 (inclusive)
    pub start_addr: u64,
    /// End address of round 0 (exclusive)
    pub end_addr: u64,
    /// Address pattern
    pub pattern: AddrPattern,
    /// Requested access kind
    pub kind: AccessKind,
    /// Address step in bytes
    pub step: u64,
    /// Mark reads as critical loads (`C` instead of `R`)
    pub critical_load: bool,
    /// Number of rounds; each round shifts past the previous footprint
    pub repeat_rounds: u64,
    /// Idle cycles appended to every record (0 = none)
    pub idle_cycles: u64,
}

impl TraceRequest {
    /// Sequential sweep over `[start_addr, end_addr)`
    #[must_use]
    pub fn sequential(start_addr: u64, end_addr: u64, kind: AccessKind) -> Self {
        Self {
            start_addr,
            end_addr,
            pattern: AddrPattern::Sequential,
            kind,
            step: 1,
            critical_load: false,
            repeat_rounds: 1,
            idle_cycles: 0,
        }
    }

    /// Pointer-chasing walk over `[start_addr, end_addr)`; reads are critical
    #[must_use]
    pub fn pointer_chasing(start_addr: u64, end_addr: u64, kind: AccessKind) -> Self {
        Self {
            start_addr,
            end_addr,
            pattern: AddrPattern::PointerChasing,
            kind,
            step: 1,
            critical_load: true,
            repeat_rounds: 1,
            idle_cycles: 0,
        }
    }

    /// Set the address step in bytes
    #[must_use]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Set whether reads are emitted as critical loads
    #[must_use]
    pub fn with_critical_load(mut self, critical_load: bool) -> Self {
        self.critical_load = critical_load;
        self
    }

    /// Set the number of repeat rounds
    #[must_use]
    pub fn with_repeat_rounds(mut self, repeat_rounds: u64) -> Self {
        self.repeat_rounds = repeat_rounds;
        self
    }

    /// Set the idle-cycle gap appended to every record
    #[must_use]
    pub fn with_idle_cycles(mut self, idle_cycles: u64) -> Self {
        self.idle_cycles = idle_cycles;
        self
    }

    /// Operation emitted for this request; `critical_load` only affects reads
    #[must_use]
    pub fn op(&self) -> AccessOp {
        match self.kind {
            AccessKind::Write => AccessOp::Write,
            AccessKind::Read => {
                if self.critical_load {
                    AccessOp::CriticalRead
                } else {
                    AccessOp::Read
                }
            }
        }
    }

    /// Generate the ordered record sequence for this request
    ///
    /// The footprint `end_addr - start_addr` is fixed before round 0; after
    /// each round both bounds advance by `footprint + step` so every round
    /// touches a disjoint address range.
    ///
    /// # Errors
    ///
    /// Returns [`MedirError::InvalidConfiguration`] for a zero step, inverted
    /// bounds, or a pointer-chasing footprint of fewer than two slots.
    pub fn synthesize<R: Rng>(&self, rng: &mut R) -> Result<Vec<AccessRecord>> {
        if self.step == 0 {
            return Err(MedirError::InvalidConfiguration(
                "trace step must be non-zero".to_string(),
            ));
        }
        if self.end_addr < self.start_addr {
            return Err(MedirError::InvalidConfiguration(format!(
                "trace end address {:#x} precedes start address {:#x}",
                self.end_addr, self.start_addr
            )));
        }

        let footprint = self.end_addr - self.start_addr;
        let op = self.op();
        let mut records = Vec::new();
        let (mut start, mut end) = (self.start_addr, self.end_addr);

        for _ in 0..self.repeat_rounds {
            match self.pattern {
                AddrPattern::Sequential => {
                    let mut addr = start;
                    while addr < end {
                        records.push(AccessRecord::with_idle(addr, op, self.idle_cycles));
                        addr += self.step;
                    }
                }
                AddrPattern::PointerChasing => {
                    let arr_size = ((end - start) / self.step) as usize;
                    for slot in chase_order(arr_size, rng)? {
                        let addr = start + slot as u64 * self.step;
                        records.push(AccessRecord::with_idle(addr, op, self.idle_cycles));
                    }
                }
            }
            start += footprint + self.step;
            end += footprint + self.step;
        }

        Ok(records)
    }
}

/// Build the pointer-chasing visit order for `arr_size` slots
///
/// Draws a random successor for each slot, rejecting candidates that equal
/// the current slot or already have a successor. The result is one
/// Hamiltonian cycle through all slots: the successor permutation is a
/// derangement, and walking from slot 0 (the returned order) visits every
/// slot exactly once before wrapping.
///
/// # Errors
///
/// Returns [`MedirError::InvalidConfiguration`] when `arr_size < 2`; a
/// single slot cannot chain anywhere but itself.
pub fn chase_order<R: Rng>(arr_size: usize, rng: &mut R) -> Result<Vec<usize>> {
    if arr_size < 2 {
        return Err(MedirError::InvalidConfiguration(format!(
            "pointer-chasing needs at least 2 slots, got {arr_size}"
        )));
    }

    // next_of[s] == 0 doubles as "unassigned"; slot 0 is the chain head and
    // is never drawn as a successor, so the last slot's 0 closes the cycle.
    let mut next_of = vec![0usize; arr_size];
    let mut curr = 0;
    let mut next = 0;
    for _ in 0..arr_size - 1 {
        while next_of[next] != 0 || next == curr {
            next = rng.gen_range(0..arr_size);
        }
        next_of[curr] = next;
        curr = next;
    }

    let mut order = Vec::with_capacity(arr_size);
    let mut slot = 0;
    for _ in 0..arr_size {
        order.push(slot);
        slot = next_of[slot];
    }
    Ok(order)
}

/// Worst-case overwrite probe: `iterations` writes cycling through
/// `OVERWRITE_LINE_SIZE / 64` cache lines starting at `addr`
#[must_use]
pub fn overwrite_trace(addr: u64, iterations: u64) -> Vec<AccessRecord> {
    overwrite_trace_sized(addr, iterations, OVERWRITE_LINE_SIZE)
}

/// Overwrite probe with an explicit working-set size in bytes
#[must_use]
pub fn overwrite_trace_sized(addr: u64, iterations: u64, line_size: u64) -> Vec<AccessRecord> {
    (0..iterations)
        .map(|i| AccessRecord::new(addr + (i * CACHE_LINE_BYTES) % line_size, AccessOp::Write))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // =========================================================================
    // Wire format
    // =========================================================================

    #[test]
    fn test_wire_format_critical_read() {
        let rec = AccessRecord::new(0x0, AccessOp::CriticalRead);
        assert_eq!(rec.to_string(), "0x00000000 C");
    }

    #[test]
    fn test_wire_format_write_with_idle() {
        let rec = AccessRecord::with_idle(0x40, AccessOp::Write, 5);
        assert_eq!(rec.to_string(), "0x00000040 W:5");
    }

    #[test]
    fn test_wire_format_zero_idle_omits_suffix() {
        let rec = AccessRecord::with_idle(0x40, AccessOp::Read, 0);
        assert_eq!(rec.to_string(), "0x00000040 R");
    }

    #[test]
    fn test_parse_line_roundtrip() {
        for line in ["0x00000000 C", "0x00000040 W:5", "0x0000ffc0 R"] {
            let rec = AccessRecord::parse_line(line).expect("parse");
            assert_eq!(rec.to_string(), line);
        }
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(AccessRecord::parse_line("").is_err());
        assert!(AccessRecord::parse_line("1234 R").is_err());
        assert!(AccessRecord::parse_line("0x10 X").is_err());
        assert!(AccessRecord::parse_line("0x10 R:abc").is_err());
        assert!(AccessRecord::parse_line("0x10 R extra").is_err());
    }

    #[test]
    fn test_format_parse_trace_roundtrip() {
        let records = vec![
            AccessRecord::new(0x0, AccessOp::CriticalRead),
            AccessRecord::with_idle(0x40, AccessOp::Write, 5),
            AccessRecord::new(0x80, AccessOp::Read),
        ];
        let body = format_trace(&records);
        assert_eq!(parse_trace(&body).expect("parse"), records);
    }

    // =========================================================================
    // Sequential pattern
    // =========================================================================

    #[test]
    fn test_sequential_record_addresses() {
        let mut rng = StdRng::seed_from_u64(0);
        let records = TraceRequest::sequential(0, 256, AccessKind::Read)
            .with_step(64)
            .synthesize(&mut rng)
            .expect("synthesize");
        let addrs: Vec<u64> = records.iter().map(|r| r.addr).collect();
        assert_eq!(addrs, vec![0x0, 0x40, 0x80, 0xc0]);
        assert!(records.iter().all(|r| r.op == AccessOp::Read));
    }

    #[test]
    fn test_sequential_rounds_touch_disjoint_ranges() {
        let mut rng = StdRng::seed_from_u64(0);
        let records = TraceRequest::sequential(0, 256, AccessKind::Write)
            .with_step(64)
            .with_repeat_rounds(2)
            .synthesize(&mut rng)
            .expect("synthesize");
        assert_eq!(records.len(), 8);
        // Round 1 starts at footprint + step past round 0's start.
        assert_eq!(records[4].addr, 256 + 64);
        let round0: Vec<u64> = records[..4].iter().map(|r| r.addr).collect();
        let round1: Vec<u64> = records[4..].iter().map(|r| r.addr).collect();
        assert!(round0.iter().all(|a| !round1.contains(a)));
    }

    #[test]
    fn test_sequential_critical_load_only_affects_reads() {
        let mut rng = StdRng::seed_from_u64(0);
        let reads = TraceRequest::sequential(0, 128, AccessKind::Read)
            .with_step(64)
            .with_critical_load(true)
            .synthesize(&mut rng)
            .expect("synthesize");
        assert!(reads.iter().all(|r| r.op == AccessOp::CriticalRead));

        let writes = TraceRequest::sequential(0, 128, AccessKind::Write)
            .with_step(64)
            .with_critical_load(true)
            .synthesize(&mut rng)
            .expect("synthesize");
        assert!(writes.iter().all(|r| r.op == AccessOp::Write));
    }

    #[test]
    fn test_synthesize_rejects_bad_bounds_and_step() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(TraceRequest::sequential(0, 64, AccessKind::Read)
            .with_step(0)
            .synthesize(&mut rng)
            .is_err());
        assert!(TraceRequest::sequential(128, 64, AccessKind::Read)
            .synthesize(&mut rng)
            .is_err());
    }

    // =========================================================================
    // Pointer chasing
    // =========================================================================

    #[test]
    fn test_chase_order_visits_every_slot_once() {
        let mut rng = StdRng::seed_from_u64(7);
        for arr_size in [2, 3, 8, 64, 257] {
            let order = chase_order(arr_size, &mut rng).expect("chase order");
            assert_eq!(order.len(), arr_size);
            assert_eq!(order[0], 0);
            let mut seen = vec![false; arr_size];
            for slot in &order {
                assert!(!seen[*slot], "slot {slot} visited twice");
                seen[*slot] = true;
            }
            assert!(seen.iter().all(|v| *v));
        }
    }

    #[test]
    fn test_chase_order_has_no_self_loop() {
        let mut rng = StdRng::seed_from_u64(11);
        let order = chase_order(32, &mut rng).expect("chase order");
        for pair in order.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        // The wrap from the last slot back to slot 0 is not a self-loop either.
        assert_ne!(order[order.len() - 1], 0);
    }

    #[test]
    fn test_chase_order_rejects_tiny_arrays() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(chase_order(0, &mut rng).is_err());
        assert!(chase_order(1, &mut rng).is_err());
    }

    #[test]
    fn test_pointer_chasing_trace_is_critical_by_default() {
        let mut rng = StdRng::seed_from_u64(3);
        let records = TraceRequest::pointer_chasing(0, 512, AccessKind::Read)
            .with_step(64)
            .synthesize(&mut rng)
            .expect("synthesize");
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.op == AccessOp::CriticalRead));
        let mut addrs: Vec<u64> = records.iter().map(|r| r.addr).collect();
        addrs.sort_unstable();
        assert_eq!(addrs, (0..8).map(|i| i * 64).collect::<Vec<u64>>());
    }

    #[test]
    fn test_pointer_chasing_seeded_reproducibility() {
        let request = TraceRequest::pointer_chasing(0, 4096, AccessKind::Read).with_step(64);
        let a = request
            .synthesize(&mut StdRng::seed_from_u64(42))
            .expect("synthesize");
        let b = request
            .synthesize(&mut StdRng::seed_from_u64(42))
            .expect("synthesize");
        assert_eq!(a, b);
    }

    // =========================================================================
    // Overwrite pattern
    // =========================================================================

    #[test]
    fn test_overwrite_trace_cycles_cache_lines() {
        let records = overwrite_trace(0, 4);
        let addrs: Vec<u64> = records.iter().map(|r| r.addr).collect();
        assert_eq!(addrs, vec![0, 64, 128, 192]);
        assert!(records.iter().all(|r| r.op == AccessOp::Write));
    }

    #[test]
    fn test_overwrite_trace_wraps_at_line_size() {
        let records = overwrite_trace(0x1000, 6);
        let addrs: Vec<u64> = records.iter().map(|r| r.addr).collect();
        assert_eq!(
            addrs,
            vec![0x1000, 0x1040, 0x1080, 0x10c0, 0x1000, 0x1040]
        );
    }

    // =========================================================================
    // Kind parsing
    // =========================================================================

    #[test]
    fn test_access_kind_parse() {
        assert_eq!(AccessKind::parse("r").expect("r"), AccessKind::Read);
        assert_eq!(AccessKind::parse("W").expect("W"), AccessKind::Write);
        assert!(matches!(
            AccessKind::parse("mix"),
            Err(MedirError::InvalidAccessKind { .. })
        ));
    }
}
