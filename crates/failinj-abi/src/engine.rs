//! Process-wide engine singleton: one `OnceLock`-backed instance, built from
//! the environment on first use.

use std::io::Write;
use std::sync::OnceLock;

use failinj_core::{Config, Engine, EngineError};

static ENGINE: OnceLock<Engine> = OnceLock::new();

/// The single process-wide engine. Building it can fail (e.g. it cannot
/// open the database) — that is fatal and never recovered.
pub fn global() -> &'static Engine {
    ENGINE.get_or_init(|| {
        let config = Config::from_env();
        match Engine::new(config) {
            Ok(engine) => engine,
            Err(err) => fatal(&err),
        }
    })
}

/// Print the configured tag + message, flush, and exit with the configured
/// (or default) internal-error code. Never returns.
pub fn fatal(err: &EngineError) -> ! {
    eprintln!("{}: engine error: {err}", failinj_core::config::TAG);
    let _ = std::io::stderr().flush();
    let code = Config::from_env().exit_error;
    // SAFETY: `_exit` takes no arguments that require invariants beyond the
    // exit code itself; this bypasses further atexit/dtor handlers, which is
    // intended — the engine is already broken.
    unsafe { libc::_exit(code) };
}
