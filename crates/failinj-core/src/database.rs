//! Append-only callsite database.
//!
//! Raw binary sequence of 8-byte native-endian `u64` hashes, no header, no
//! framing. Loaded once at first injection decision and appended to whenever
//! a new callsite is observed.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

const RECORD_SIZE: usize = std::mem::size_of::<u64>();

pub struct Database {
    path: PathBuf,
    file: File,
}

impl Database {
    /// Open (creating if absent) in append+read mode. Fail-fast.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|source| EngineError::DatabaseOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Read every 8-byte record from the start of the file, one record at a
    /// time.
    ///
    /// Defensive bail: two consecutive zero records — anywhere, including as
    /// the first two records in the file — stop the load immediately. A
    /// legitimate `0` hash can only ever appear as the very first record.
    /// Records are read one fixed-size chunk at a time (rather than slurped
    /// with a single `read_to_end`) specifically so this check can fire
    /// against an endless zero-byte stream like `/dev/full`: `read_to_end`
    /// never observes EOF on such a device, so the bail would be
    /// unreachable for the exact pathological case it exists to guard
    /// against.
    pub fn load(&mut self) -> Result<Vec<u64>, EngineError> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|source| EngineError::DatabaseRead {
                path: self.path.clone(),
                source,
            })?;

        let mut hashes = Vec::new();
        let mut prev_was_zero = false;
        let mut record = [0u8; RECORD_SIZE];

        loop {
            let complete = read_record(&mut self.file, &mut record).map_err(|source| EngineError::DatabaseRead {
                path: self.path.clone(),
                source,
            })?;
            if !complete {
                break;
            }

            let hash = u64::from_ne_bytes(record);
            if hash == 0 {
                if prev_was_zero {
                    break;
                }
                prev_was_zero = true;
            } else {
                prev_was_zero = false;
            }
            hashes.push(hash);
        }

        Ok(hashes)
    }

    /// Append one 8-byte hash and flush. Both failures are fatal.
    pub fn append(&mut self, hash: u64) -> Result<(), EngineError> {
        self.file
            .write_all(&hash.to_ne_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|source| EngineError::DatabaseWrite {
                path: self.path.clone(),
                source,
            })
    }
}

/// Fill `record` one `read()` call at a time. Returns `Ok(true)` once a full
/// record has been read, `Ok(false)` on a clean EOF before any bytes of this
/// record arrived, or on a truncated trailing record (fewer than
/// `RECORD_SIZE` bytes left at end of file) — both are treated as "nothing
/// more to load".
fn read_record(file: &mut File, record: &mut [u8; RECORD_SIZE]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        let n = file.read(&mut record[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}
