//! Injection decision.
//!
//! For each interposed primitive `P` about to call the underlying `P`:
//!
//! 1. Reentrancy flag raised -> no injection.
//! 2. "Already injected this run" -> no injection (at most one per run).
//! 3. Raise reentrancy; lazily load the database on first use.
//! 4. Fingerprint the stack; `Skip` -> drop through.
//! 5. Insert into the callsite table. Known site -> drop through. New site ->
//!    append to database, print the injection banner, latch "already
//!    injected", return `true`.
//! 6. Lower reentrancy flag (handled by `ReentrancyGuard`'s `Drop`).

use std::sync::atomic::Ordering;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::fingerprint::{self, Fingerprint};
use crate::gate::ReentrancyGuard;
use crate::table::HashEntry;

impl Engine {
    /// Decide whether the call site currently unwinding through this thread
    /// should be failed. `Ok(true)` means the caller must synthesize the
    /// primitive's documented failure instead of calling through.
    pub fn should_inject(&self) -> Result<bool, EngineError> {
        if crate::gate::is_reentrant() {
            return Ok(false);
        }
        if self.already_injected.load(Ordering::Acquire) {
            return Ok(false);
        }

        let _guard = ReentrancyGuard::enter();
        let mut state = self.state.lock();

        // Re-check under the lock: two threads can both pass the fast-path
        // check above for two different first-time call sites before either
        // acquires the mutex. Only one may actually inject per run.
        if self.already_injected.load(Ordering::Acquire) {
            return Ok(false);
        }

        if !state.loaded {
            let hashes = state.database.load()?;
            for hash in hashes {
                state.tables.callsites.insert(HashEntry {
                    hash,
                    backtrace: None,
                });
            }
            state.loaded = true;
        }

        match fingerprint::fingerprint(&self.config.skip_injection) {
            Fingerprint::Skip => Ok(false),
            Fingerprint::Hash(hash) => {
                let newly_seen = state.tables.callsites.insert(HashEntry {
                    hash,
                    backtrace: None,
                });
                if !newly_seen {
                    return Ok(false);
                }

                state.database.append(hash)?;
                let backtrace = fingerprint::backtrace_text();
                eprintln!(
                    "{}: Injecting failure at:\n{backtrace}",
                    crate::config::TAG
                );
                self.already_injected.store(true, Ordering::Release);
                Ok(true)
            }
        }
    }
}
