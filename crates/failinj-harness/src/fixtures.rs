//! Shared scenario fixtures for the `tests/*_test.rs` files.

use failinj_core::{Config, Engine};

/// Build a fresh engine over a scratch database file inside `dir`, with
/// otherwise-default configuration.
pub fn fresh_engine(dir: &std::path::Path, db_name: &str) -> Engine {
    let mut config = Config::default();
    config.database_path = dir.join(db_name);
    Engine::new(config).expect("scratch engine should construct")
}

/// As [`fresh_engine`], but pre-populated with `skip_injection` tokens.
pub fn engine_with_skip(dir: &std::path::Path, db_name: &str, skip: &[&str]) -> Engine {
    let mut config = Config::default();
    config.database_path = dir.join(db_name);
    config.skip_injection = skip.iter().map(|s| s.to_string()).collect();
    Engine::new(config).expect("scratch engine should construct")
}
