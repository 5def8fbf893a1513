//! Test-only library crate: a home for `tests/*_test.rs` to share setup
//! helpers, with one `tests/*_test.rs` file per concern plus a small
//! `src/bin` inspection tool alongside the suite.

pub mod fixtures;
