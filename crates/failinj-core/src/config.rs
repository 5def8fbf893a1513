//! Environment-driven configuration surface.
//!
//! `<PFX>` is resolved at build time via `option_env!("FAILINJ_TAG")` so a
//! downstream build can produce a differently-tagged `.so` (e.g. `FAILCOV`)
//! without touching source.

use std::env;

/// Build-time announcement tag, `<PFX>` throughout.
pub const TAG: &str = match option_env!("FAILINJ_TAG") {
    Some(tag) => tag,
    None => "FAILINJ",
};

pub const DEFAULT_EXIT_ERROR: i32 = 32;
pub const DEFAULT_BUG_FOUND: i32 = 33;
pub const DEFAULT_DATABASE_FILENAME: &str = "failinj.db";

/// One resource-tracking category's pair of ignore-list environment variables.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    pub blanket: bool,
    pub tokens: Vec<String>,
}

impl IgnoreFilter {
    fn load(category: &str) -> Self {
        let blanket = env_flag(&format!("{TAG}_IGNORE_ALL_{category}"));
        let tokens = env::var(format!("{TAG}_IGNORE_{category}"))
            .ok()
            .map(|raw| {
                raw.split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self { blanket, tokens }
    }

    /// A resource/report is ignored if the blanket switch is set, or any
    /// configured token is a substring of `backtrace`.
    pub fn ignores(&self, backtrace: &str) -> bool {
        self.blanket || self.tokens.iter().any(|tok| backtrace.contains(tok.as_str()))
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| !v.is_empty() && v != "0")
}

/// Snapshot of the whole configuration surface, read once at first use and
/// cached by callers behind a `OnceLock` (see `failinj_abi::engine`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: std::path::PathBuf,
    pub exit_error: i32,
    pub bug_found: i32,
    pub skip_injection: Vec<String>,

    pub mem_leaks: IgnoreFilter,
    pub fd_leaks: IgnoreFilter,
    pub file_leaks: IgnoreFilter,
    pub untracked_frees: IgnoreFilter,
    pub untracked_closes: IgnoreFilter,
    pub untracked_fcloses: IgnoreFilter,
}

impl Config {
    /// Read the whole surface from the process environment. Fatal-on-error
    /// callers (the shutdown hook) should fall back to `Config::default()` on
    /// any unexpected failure.
    pub fn from_env() -> Self {
        let database_path = env::var(format!("{TAG}_DATABASE"))
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| std::path::PathBuf::from(DEFAULT_DATABASE_FILENAME));

        let exit_error = env_int(&format!("{TAG}_EXIT_ERROR")).unwrap_or(DEFAULT_EXIT_ERROR);
        let bug_found = env_int(&format!("{TAG}_BUG_FOUND")).unwrap_or(DEFAULT_BUG_FOUND);

        let skip_injection = env::var(format!("{TAG}_SKIP_INJECTION"))
            .ok()
            .map(|raw| {
                raw.split_whitespace()
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            database_path,
            exit_error,
            bug_found,
            skip_injection,
            mem_leaks: IgnoreFilter::load("MEM_LEAKS"),
            fd_leaks: IgnoreFilter::load("FD_LEAKS"),
            file_leaks: IgnoreFilter::load("FILE_LEAKS"),
            untracked_frees: IgnoreFilter::load("UNTRACKED_FREES"),
            untracked_closes: IgnoreFilter::load("UNTRACKED_CLOSES"),
            untracked_fcloses: IgnoreFilter::load("UNTRACKED_FCLOSES"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: std::path::PathBuf::from(DEFAULT_DATABASE_FILENAME),
            exit_error: DEFAULT_EXIT_ERROR,
            bug_found: DEFAULT_BUG_FOUND,
            skip_injection: Vec::new(),
            mem_leaks: IgnoreFilter::default(),
            fd_leaks: IgnoreFilter::default(),
            file_leaks: IgnoreFilter::default(),
            untracked_frees: IgnoreFilter::default(),
            untracked_closes: IgnoreFilter::default(),
            untracked_fcloses: IgnoreFilter::default(),
        }
    }
}

fn env_int(name: &str) -> Option<i32> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_filter_blanket_ignores_everything() {
        let f = IgnoreFilter {
            blanket: true,
            tokens: vec![],
        };
        assert!(f.ignores("anything at all"));
    }

    #[test]
    fn ignore_filter_substring_match() {
        let f = IgnoreFilter {
            blanket: false,
            tokens: vec!["helper_alloc".to_string()],
        };
        assert!(f.ignores("    helper_alloc+0x10\n    main+0x20\n"));
        assert!(!f.ignores("    main+0x20\n"));
    }

    #[test]
    fn default_config_uses_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.exit_error, DEFAULT_EXIT_ERROR);
        assert_eq!(cfg.bug_found, DEFAULT_BUG_FOUND);
        assert_eq!(cfg.database_path, std::path::PathBuf::from(DEFAULT_DATABASE_FILENAME));
    }
}
