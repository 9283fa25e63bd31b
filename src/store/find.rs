//! Linear key index with a single-slot last-found cache.
//!
//! Lookup is a byte-exact linear scan over live descriptors. The header
//! keeps the index of the last successful mutating lookup; when it still
//! names a live descriptor whose key matches the query, the scan is
//! short-circuited. The cache is cleared by everything that could make it
//! lie: delete, create-via-recycle, merge, the collector phases that rebind
//! hunks, the sorts, clear, and empty.

use crate::constants::NIL;
use crate::store::Store;

impl<'b> Store<'b> {
    /// Find the live descriptor carrying `key`.
    ///
    /// Consults the last-found cache but does not refresh it; refreshing
    /// needs a mutable borrow (see [`find_and_cache`](Store::find_and_cache)).
    pub(crate) fn find(&self, key: &[u8]) -> Option<u32> {
        let cached = self.last_found();
        if cached != NIL
            && (cached as usize) < self.stack_count()
            && !self.desc(cached).is_garbage()
            && self.key_bytes(cached) == key
        {
            return Some(cached);
        }

        for idx in 0..self.stack_count() as u32 {
            if self.desc(idx).is_garbage() {
                continue;
            }
            if self.key_bytes(idx) == key {
                return Some(idx);
            }
        }
        None
    }

    /// Find the live descriptor carrying `key` and remember the hit.
    pub(crate) fn find_and_cache(&mut self, key: &[u8]) -> Option<u32> {
        let found = self.find(key);
        if let Some(idx) = found {
            self.set_last_found(idx);
        }
        found
    }

    /// First garbage descriptor whose hunk is exactly `hunk_size` bytes.
    ///
    /// Only exact matches recycle; a larger hunk would leak its tail bytes
    /// because the descriptor tracks one contiguous hunk, not a split.
    pub(crate) fn find_recyclable(&self, hunk_size: usize) -> Option<u32> {
        let mut idx = self.garbage_front();
        while idx != NIL {
            let d = self.desc(idx);
            if d.hunk_size as usize == hunk_size {
                return Some(idx);
            }
            idx = d.next_garbage;
        }
        None
    }
}
