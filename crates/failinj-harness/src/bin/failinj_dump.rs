//! Small inspection tool for a `failinj` callsite database file.
//!
//! Ships as its own `clap`-derived binary alongside the test suite for
//! ad-hoc inspection rather than folding this into the library crates.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

/// Dump the raw 64-bit callsite hashes recorded in a failinj database file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the database file (defaults to the `FAILINJ_DATABASE`
    /// environment variable, or `failinj.db` if unset).
    #[arg(value_name = "DATABASE")]
    database: Option<PathBuf>,

    /// Emit JSON instead of one hash per line.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Dump {
    database: PathBuf,
    count: usize,
    hashes: Vec<String>,
}

fn main() {
    let args = Args::parse();

    let database = args.database.unwrap_or_else(|| {
        std::env::var(format!("{}_DATABASE", failinj_core::config::TAG))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(failinj_core::config::DEFAULT_DATABASE_FILENAME))
    });

    let mut db = match failinj_core::database::Database::open(&database) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("failinj-dump: {err}");
            std::process::exit(1);
        }
    };

    let hashes = match db.load() {
        Ok(hashes) => hashes,
        Err(err) => {
            eprintln!("failinj-dump: {err}");
            std::process::exit(1);
        }
    };

    if args.json {
        let dump = Dump {
            count: hashes.len(),
            hashes: hashes.iter().map(|h| format!("{h:016x}")).collect(),
            database,
        };
        println!("{}", serde_json::to_string_pretty(&dump).expect("Dump serializes"));
    } else {
        for hash in &hashes {
            println!("{hash:016x}");
        }
    }
}
