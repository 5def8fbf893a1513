//! Engine-internal fatal error conditions.
//!
//! These are never handed back to the program under test: the wrapper that
//! hits one of these prints the configured tag, flushes, and exits with the
//! configured internal-error code. See `failinj_abi`'s shutdown/startup glue.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot open callsite database {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read callsite database {path}: {source}")]
    DatabaseRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot append to callsite database {path}: {source}")]
    DatabaseWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not resolve next binding of symbol {name}")]
    SymbolResolution { name: &'static str },
}
