//! Stack fingerprinter.
//!
//! Walks the current call stack, turns each frame into `"<symbol>+0x<offset>"`
//! text, and folds every frame into a single 64-bit djb hash. Hashing the
//! textual frame names (not raw addresses) yields identical hashes across
//! ASLR-randomized runs while still distinguishing inlining and call-depth
//! differences.

use std::fmt::Write as _;

/// Bernstein djb hash seed.
const DJB_SEED: u64 = 53_815_381;

/// Build marker that identifies the coverage-dump routine; a frame with this
/// symbol causes the walk to report [`Fingerprint::Skip`] so the engine never
/// injects into its own coverage instrumentation.
const COVERAGE_DUMP_MARKER: &str = "gcov_do_dump";

/// Outcome of a stack walk: either a stable hash, or an instruction to skip
/// injection entirely for this call (configured skip-list match, or the
/// coverage-dump edge case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    Hash(u64),
    Skip,
}

struct Frame {
    symbol: String,
    offset: usize,
}

impl Frame {
    fn text(&self) -> String {
        format!("{}+0x{:x}", self.symbol, self.offset)
    }
}

#[allow(unsafe_code)]
fn walk() -> Vec<Frame> {
    let mut frames = Vec::new();
    // SAFETY: `backtrace::trace` is documented not to be signal-safe; this
    // this crate's contract already requires signal-free call sites.
    unsafe {
        backtrace::trace(|frame| {
            let ip = frame.ip();
            let mut symbol = None;
            let mut offset = 0usize;
            backtrace::resolve_frame(frame, |sym| {
                if symbol.is_none() {
                    symbol = sym.name().map(|n| n.to_string());
                    if let Some(sym_addr) = sym.addr() {
                        offset = (ip as usize).saturating_sub(sym_addr as usize);
                    }
                }
            });
            frames.push(Frame {
                symbol: symbol.unwrap_or_else(|| "unknown".to_string()),
                offset,
            });
            true
        });
    }
    frames
}

fn djb_hash<'a>(parts: impl Iterator<Item = &'a str>) -> u64 {
    let mut h: u64 = DJB_SEED;
    for part in parts {
        for byte in part.bytes() {
            h = h.wrapping_mul(33) ^ (byte as u64);
        }
    }
    h
}

/// Walk the stack and fold it into a [`Fingerprint`]. `skip_tokens` is the
/// configured `SKIP_INJECTION` list: if any frame's symbol
/// contains any listed substring, or equals the coverage-dump marker, the
/// call returns `Fingerprint::Skip`.
pub fn fingerprint(skip_tokens: &[String]) -> Fingerprint {
    let frames = walk();

    for frame in &frames {
        if frame.symbol.contains(COVERAGE_DUMP_MARKER) {
            return Fingerprint::Skip;
        }
        if skip_tokens
            .iter()
            .any(|tok| !tok.is_empty() && frame.symbol.contains(tok.as_str()))
        {
            return Fingerprint::Skip;
        }
    }

    let texts: Vec<String> = frames.iter().map(Frame::text).collect();
    Fingerprint::Hash(djb_hash(texts.iter().map(String::as_str)))
}

/// Pretty-printed multi-line backtrace text, one indented frame per line,
/// for injection banners and bug reports.
pub fn backtrace_text() -> String {
    let frames = walk();
    let mut out = String::new();
    for frame in &frames {
        let _ = writeln!(out, "    {}", frame.text());
    }
    out
}
