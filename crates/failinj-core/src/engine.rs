//! The engine: everything a single process run needs, behind one mutex.
//!
//! One process-wide state object behind a `OnceLock` in production; the
//! state object owns the database file handle and the resource tables —
//! one mutex, one append-only database.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::config::Config;
use crate::database::Database;
use crate::error::EngineError;
use crate::table::Tables;

/// Mutable state guarded by the engine's single mutex: the resource tables,
/// the database handle, and whether the database has been loaded into the
/// callsite table yet.
pub(crate) struct EngineState {
    pub tables: Tables,
    pub database: Database,
    pub loaded: bool,
}

/// One process's view of the fault-injection engine.
///
/// Production code (`failinj-abi`) keeps exactly one of these alive for the
/// life of the process, behind a `OnceLock` (see `failinj_abi::engine`).
/// Tests construct their own, pointed at a scratch database file, for
/// isolation — an in-process, disposable engine per test.
pub struct Engine {
    pub config: Config,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) already_injected: AtomicBool,
    pub(crate) bug_found: AtomicBool,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self, EngineError> {
        let database = Database::open(&config.database_path)?;
        Ok(Self {
            config,
            state: Mutex::new(EngineState {
                tables: Tables::default(),
                database,
                loaded: false,
            }),
            already_injected: AtomicBool::new(false),
            bug_found: AtomicBool::new(false),
        })
    }

    /// Monotonic bug flag: once any leak or untracked release sets
    /// this, the shutdown hook overrides the process exit code.
    pub fn bug_found(&self) -> bool {
        self.bug_found.load(Ordering::Acquire)
    }

    pub(crate) fn mark_bug_found(&self) {
        self.bug_found.store(true, Ordering::Release);
    }
}
