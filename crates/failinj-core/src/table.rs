//! Fixed-size chained hash table fabric.
//!
//! Four logical tables — callsites seen, live allocations, live descriptors,
//! live streams — share one process-wide mutex. No resize, no rehashing: the
//! path length here is dwarfed by the stack walk performed for every
//! intercepted call.

/// Bucket count. Fixed width; must stay a power of two so the mask below is
/// a plain `&`.
const WIDTH: usize = 1024;
const MASK: u64 = (WIDTH as u64) - 1;

/// An entry owned exclusively by whichever table currently holds it.
#[derive(Debug, Clone)]
pub struct HashEntry {
    pub hash: u64,
    pub backtrace: Option<String>,
}

/// One fixed-width chained-bucket table. Not `Sync` on its own — callers go
/// through [`Tables::lock`] to get serialized access to all four at once.
pub struct Table {
    buckets: Vec<Vec<HashEntry>>,
}

impl Table {
    fn new() -> Self {
        Self {
            buckets: (0..WIDTH).map(|_| Vec::new()).collect(),
        }
    }

    #[inline]
    fn bucket_index(hash: u64) -> usize {
        (hash & MASK) as usize
    }

    /// Insert `entry`, unless a same-hash entry is already present. Returns
    /// `true` if the entry was newly inserted (and is now owned by the
    /// table); `false` if a same-hash entry already existed — a table never
    /// contains two entries with equal hash.
    pub fn insert(&mut self, entry: HashEntry) -> bool {
        let bucket = &mut self.buckets[Self::bucket_index(entry.hash)];
        if bucket.iter().any(|e| e.hash == entry.hash) {
            return false;
        }
        bucket.push(entry);
        true
    }

    /// Remove and return the entry with the given hash, if present.
    pub fn pop(&mut self, hash: u64) -> Option<HashEntry> {
        let bucket = &mut self.buckets[Self::bucket_index(hash)];
        let pos = bucket.iter().position(|e| e.hash == hash)?;
        Some(bucket.swap_remove(pos))
    }

    /// Whether `hash` is currently present, without removing it.
    pub fn contains(&self, hash: u64) -> bool {
        self.buckets[Self::bucket_index(hash)]
            .iter()
            .any(|e| e.hash == hash)
    }

    /// Iterate all currently-held entries (used for the end-of-process leak
    /// scan and for database replay consistency checks).
    pub fn iter(&self) -> impl Iterator<Item = &HashEntry> {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all entries, freeing them. Used by the shutdown hook after the
    /// leak scan, which frees every surviving entry.
    pub fn drain_all(&mut self) -> Vec<HashEntry> {
        self.buckets.iter_mut().flat_map(std::mem::take).collect()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

/// The four resource-tracking tables. In production exactly one `Tables`
/// exists for the life of the process, owned by the single
/// [`crate::engine::Engine`] behind its one mutex, which serializes both
/// operations across all four tables; tests construct their own disposable
/// instance per [`crate::engine::Engine`].
#[derive(Default)]
pub struct Tables {
    pub callsites: Table,
    pub allocations: Table,
    pub descriptors: Table,
    pub streams: Table,
}
