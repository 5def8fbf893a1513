//! Process constructor/destructor glue.
//!
//! `#[ctor]`/`#[dtor]` are the idiomatic Rust equivalent of
//! `__attribute__((constructor/destructor))`, the mechanism CRT bootstrap
//! hooks for an `LD_PRELOAD`-style library rely on. The constructor only
//! warms ambient diagnostics; the destructor is the shutdown hook.

use std::io::Write;

/// Installs a `tracing` subscriber driven by `RUST_LOG`, for ambient
/// engine-internal diagnostics only — the mandated stderr banners
/// are plain `eprintln!` writes and are unaffected by this subscriber's
/// filtering or formatting.
#[ctor::ctor]
fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!(tag = failinj_core::config::TAG, "failinj engine constructed");
}

/// End-of-process leak scan and exit-code override.
///
/// If reading the environment for the shutdown-time configuration itself
/// fails unexpectedly, the default configuration is used. Engine
/// construction failures are handled the same way they are everywhere
/// else: fatal, immediate exit with the internal-error code.
#[ctor::dtor]
fn shutdown_hook() {
    let _guard = failinj_core::gate::ReentrancyGuard::enter();
    let engine = crate::engine::global();

    engine.scan_leaks_and_drain();

    let _ = std::io::stderr().flush();

    if engine.bug_found() {
        let code = engine.config.bug_found;
        // SAFETY: `_exit` is safe to call with any exit code; this runs at
        // normal process teardown, intentionally short-circuiting any
        // remaining destructors to force the overridden exit code.
        unsafe { libc::_exit(code) };
    }
}
