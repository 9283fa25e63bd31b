//! Arena controller: the top-level datastore.

use log::{debug, trace};

use crate::arena::KvDesc;
use crate::constants::{DESC_SIZE, HEADER_SIZE, MAX_KEY_LENGTH, MAX_SIZE, NIL};
use crate::error::{Error, Result};

/// Embedded key-value datastore inside a caller-supplied byte buffer.
///
/// The store owns no memory of its own: header, keyvalue descriptors, and
/// payload bytes all live inside the borrowed buffer. The buffer is split
/// into three zones whose boundaries move as operations proceed:
///
/// ```text
/// low offset                                                 high offset
/// +----------+------------------+-----------+---------------------+
/// | header   | descriptor stack |  free gap |     value heap      |
/// |          |     grows up →   |           |   ← grows down      |
/// +----------+------------------+-----------+---------------------+
/// ```
///
/// Deleting a key marks its descriptor as garbage; the bytes are given back
/// only when the caller invokes one of the collector primitives
/// ([`gc_pop`](Store::gc_pop), [`merge`](Store::merge),
/// [`gc_fold`](Store::gc_fold), [`gc_pack`](Store::gc_pack),
/// [`collect`](Store::collect), [`clean`](Store::clean)). No operation runs
/// the collector implicitly, so the caller decides which phases its
/// reference discipline tolerates.
///
/// # Reference stability
///
/// Entries obtained from [`iter`](Store::iter) or [`get`](Store::get) borrow
/// the store, so every mutating operation statically invalidates them. This
/// is deliberately stricter than the minimum: fold, pack, and the sorts
/// rebind payload bytes between hunks, so no payload reference may survive
/// them.
///
/// # Example
/// ```rust
/// use hunkstore::Store;
///
/// let mut buf = [0u8; 1024];
/// let mut store = Store::init(&mut buf, 4).unwrap();
///
/// store.create(b"foo", &[1, 2]).unwrap();
/// assert_eq!(store.get(b"foo"), Some(&[1, 2][..]));
///
/// store.delete(b"foo");
/// assert!(store.get(b"foo").is_none());
/// assert!(store.garbage_size() > 0);
///
/// let reclaimed = store.clean();
/// assert!(reclaimed > 0);
/// assert_eq!(store.garbage_size(), 0);
/// ```
pub struct Store<'b> {
    /// The caller-supplied arena. All internal references are byte offsets
    /// from index 0 of this slice.
    pub(crate) buf: &'b mut [u8],
}

impl<'b> Store<'b> {
    /// Lay out a fresh arena in `buf`.
    ///
    /// `hunk_size` is the minimum value-side allocation granularity; every
    /// hunk the store reserves is a multiple of it.
    ///
    /// # Errors
    /// [`Error::BadBuffer`] if the buffer is smaller than the header, larger
    /// than [`MAX_SIZE`], or `hunk_size` is zero.
    pub fn init(buf: &'b mut [u8], hunk_size: usize) -> Result<Self> {
        if buf.len() < HEADER_SIZE || buf.len() > MAX_SIZE || hunk_size == 0 {
            return Err(Error::BadBuffer);
        }
        let mut store = Store { buf };
        store.write_initial_header(hunk_size as u32);
        debug!(
            "init: arena size={} hunk_size={}",
            store.size(),
            store.hunk_size()
        );
        store.assert_consistent();
        Ok(store)
    }

    /// Reopen an arena that a previous [`init`](Store::init) laid out in the
    /// same buffer.
    ///
    /// The deployment owns the memory region; a component restart can pick
    /// the datastore back up without losing its contents.
    ///
    /// # Errors
    /// [`Error::BadBuffer`] if the buffer does not carry a valid arena of
    /// exactly this length.
    pub fn attach(buf: &'b mut [u8]) -> Result<Self> {
        let store = Store { buf };
        if !store.header_is_valid()
            || store.stack_end() > store.heap_top()
            || store.heap_top() > store.size()
            || store.heap_size() != store.size() - store.heap_top()
        {
            return Err(Error::BadBuffer);
        }
        store.assert_consistent();
        Ok(store)
    }

    /// Reset to the post-init state. All keyvalues are lost.
    pub fn clear(&mut self) {
        let hunk_size = self.hunk_size() as u32;
        self.write_initial_header(hunk_size);
        debug!("clear: arena reset");
        self.assert_consistent();
    }

    /// Delete every live keyvalue.
    ///
    /// Observably equivalent to [`clear`](Store::clear) for the key
    /// namespace (`count() == 0`, no key findable) but keeps the descriptors
    /// around as garbage so their hunks can be recycled or collected.
    pub fn empty(&mut self) {
        for idx in 0..self.stack_count() as u32 {
            let mut d = self.desc(idx);
            if d.is_garbage() {
                continue;
            }
            d.set_garbage(true);
            self.set_desc(idx, &d);
            self.garbage_attach(idx);
        }
        self.set_last_found(NIL);
        debug!("empty: {} keyvalues marked garbage", self.garbage_count());
        self.assert_consistent();
    }

    /// Size of the arena header in bytes.
    #[inline]
    pub fn head_size(&self) -> usize {
        HEADER_SIZE
    }

    /// Bytes currently in use: header, descriptor stack, and value heap.
    #[inline]
    pub fn size_used(&self) -> usize {
        HEADER_SIZE + self.stack_count() * DESC_SIZE + self.heap_size()
    }

    /// Number of live keyvalues.
    #[inline]
    pub fn count(&self) -> usize {
        self.stack_count() - self.garbage_count()
    }

    /// Whether the store holds no live keyvalue.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Maximum key length in bytes, excluding the NUL terminator.
    #[inline]
    pub fn max_key_length(&self) -> usize {
        MAX_KEY_LENGTH
    }

    /// Upper bound on the number of keyvalues of `kv_size` payload bytes
    /// (key, NUL, and value together) this arena could ever hold.
    pub fn max_count(&self, kv_size: usize) -> usize {
        let per = DESC_SIZE + self.hunk_round(kv_size);
        (self.size() - HEADER_SIZE) / per
    }

    /// Store a new keyvalue.
    ///
    /// The hunk is recycled from an exact-size garbage descriptor when one
    /// exists, otherwise freshly allocated. A failed create leaves the arena
    /// exactly as it was.
    ///
    /// # Errors
    /// - [`Error::KeyExists`] if a live keyvalue already carries `key`.
    /// - [`Error::BadKey`] if `key` is empty, longer than
    ///   [`MAX_KEY_LENGTH`], or contains a NUL byte.
    /// - [`Error::OutOfSpace`] if the descriptor stack would cross the heap.
    pub fn create(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if self.find(key).is_some() {
            return Err(Error::KeyExists);
        }

        let needed = key.len() + 1 + value.len();
        let hunk_required = self.hunk_round(needed);

        if let Some(idx) = self.find_recyclable(hunk_required) {
            self.garbage_detach(idx);
            let mut d = self.desc(idx);
            d.set_garbage(false);
            d.prev_garbage = NIL;
            d.next_garbage = NIL;
            d.value_off = d.hunk_top;
            d.value_size = value.len() as u32;
            d.key_off = d.hunk_top + value.len() as u32;
            self.set_desc(idx, &d);
            self.write_payload(d.hunk_top as usize, key, value);
            self.set_last_found(NIL);
            trace!("create: recycled {}-byte hunk at {}", d.hunk_size, d.hunk_top);
            self.assert_consistent();
            return Ok(());
        }

        let new_stack_end = self.stack_end() + DESC_SIZE;
        let heap_top = self.heap_top();
        if hunk_required > heap_top || heap_top - hunk_required < new_stack_end {
            return Err(Error::OutOfSpace);
        }

        let top = self.heap_push(hunk_required);
        let d = KvDesc {
            hunk_top: top as u32,
            hunk_size: hunk_required as u32,
            value_off: top as u32,
            value_size: value.len() as u32,
            key_off: (top + value.len()) as u32,
            flags: 0,
            prev_garbage: NIL,
            next_garbage: NIL,
        };
        self.push_desc(&d);
        self.write_payload(top, key, value);
        trace!("create: fresh {}-byte hunk at {}", hunk_required, top);
        self.assert_consistent();
        Ok(())
    }

    /// Copy the value stored under `key` into `out`.
    ///
    /// # Errors
    /// - [`Error::KeyNotFound`] if no live keyvalue carries `key`.
    /// - [`Error::BadSize`] if `out.len()` differs from the stored size.
    pub fn read(&self, key: &[u8], out: &mut [u8]) -> Result<()> {
        let idx = self.find(key).ok_or(Error::KeyNotFound)?;
        let d = self.desc(idx);
        if d.value_size as usize != out.len() {
            return Err(Error::BadSize);
        }
        out.copy_from_slice(self.value_bytes(idx));
        Ok(())
    }

    /// Borrow the value stored under `key`, or `None` if missing.
    #[inline]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.find(key).map(|idx| self.value_bytes(idx))
    }

    /// Length of the value stored under `key`, or 0 if missing.
    #[inline]
    pub fn read_size(&self, key: &[u8]) -> usize {
        match self.find(key) {
            Some(idx) => self.desc(idx).value_size as usize,
            None => 0,
        }
    }

    /// Overwrite the value stored under `key` in place.
    ///
    /// # Errors
    /// - [`Error::KeyNotFound`] if no live keyvalue carries `key`.
    /// - [`Error::BadSize`] if `value.len()` differs from the stored size.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let idx = self.find_and_cache(key).ok_or(Error::KeyNotFound)?;
        let d = self.desc(idx);
        if d.value_size as usize != value.len() {
            return Err(Error::BadSize);
        }
        let off = d.value_off as usize;
        self.buf[off..off + value.len()].copy_from_slice(value);
        self.assert_consistent();
        Ok(())
    }

    /// Delete the keyvalue stored under `key`.
    ///
    /// Idempotent: deleting a missing key is not an error. The descriptor
    /// turns into garbage and joins the garbage list; its bytes are handed
    /// back by the collector, never here.
    pub fn delete(&mut self, key: &[u8]) {
        if let Some(idx) = self.find(key) {
            let mut d = self.desc(idx);
            d.set_garbage(true);
            self.set_desc(idx, &d);
            self.garbage_attach(idx);
            self.set_last_found(NIL);
            trace!("delete: descriptor {} marked garbage", idx);
        }
        self.assert_consistent();
    }

    /// Copy every live keyvalue of `src` into this store.
    ///
    /// Aborts on the first keyvalue that cannot be created; keyvalues copied
    /// before the failure remain.
    pub fn copy_from(&mut self, src: &Store<'_>) -> Result<()> {
        for entry in src.iter() {
            self.create(entry.key(), entry.value())?;
        }
        Ok(())
    }

    /// Reject keys the layout cannot represent.
    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_LENGTH || key.contains(&0) {
            return Err(Error::BadKey);
        }
        Ok(())
    }

    /// Write value bytes, key bytes, and the NUL terminator into a hunk.
    fn write_payload(&mut self, top: usize, key: &[u8], value: &[u8]) {
        self.buf[top..top + value.len()].copy_from_slice(value);
        let key_at = top + value.len();
        self.buf[key_at..key_at + key.len()].copy_from_slice(key);
        self.buf[key_at + key.len()] = 0;
    }

    /// Full structural sweep, compiled only into debug builds.
    ///
    /// Internal inconsistency is not recoverable; every public mutation ends
    /// by asserting the arena invariants.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistent(&self) {
        let size = self.size();
        let count = self.stack_count();
        let heap_top = self.heap_top();

        assert!(self.stack_end() <= heap_top, "stack crosses heap");
        assert!(heap_top <= size, "heap top out of bounds");
        assert_eq!(self.heap_size(), size - heap_top, "heap size drifted");
        assert!(self.size_used() <= size, "used bytes exceed arena");

        let mut hunk_total = 0usize;
        let mut garbage = 0usize;
        let mut garbage_bytes = 0usize;
        for i in 0..count as u32 {
            let d = self.desc(i);
            let top = d.hunk_top as usize;
            let hunk = d.hunk_size as usize;
            hunk_total += hunk;
            // Zero-size hunks (merge leftovers) keep a stale top; no bytes,
            // no bounds to hold.
            if hunk != 0 {
                assert!(top >= heap_top && top + hunk <= size, "hunk out of heap");
                assert_eq!(hunk % self.hunk_size(), 0, "hunk not a multiple");
            }
            if d.is_garbage() {
                garbage += 1;
                garbage_bytes += d.reclaimable_size();
                continue;
            }
            let key_len = self.key_bytes(i).len();
            assert!(key_len >= 1 && key_len <= MAX_KEY_LENGTH, "bad key length");
            assert!(
                d.value_size as usize + key_len + 1 <= hunk,
                "payload exceeds hunk"
            );
            assert!(d.value_off == d.hunk_top, "value not at hunk top");
            assert_eq!(d.key_off, d.value_off + d.value_size, "key not after value");
            for j in 0..i {
                let o = self.desc(j);
                if o.is_garbage() {
                    continue;
                }
                assert_ne!(self.key_bytes(j), self.key_bytes(i), "duplicate key");
                let (ot, oh) = (o.hunk_top as usize, o.hunk_size as usize);
                assert!(top + hunk <= ot || ot + oh <= top, "hunks overlap");
            }
        }
        assert_eq!(hunk_total, self.heap_size(), "hunks do not cover heap");
        assert_eq!(garbage, self.garbage_count(), "garbage count drifted");
        assert_eq!(garbage_bytes, self.garbage_size(), "garbage bytes drifted");

        // Garbage-list reachability: every garbage descriptor exactly once.
        let mut reached = 0usize;
        let mut idx = self.garbage_front();
        let mut prev = NIL;
        while idx != NIL {
            assert!(reached <= count, "garbage list cycles");
            let d = self.desc(idx);
            assert!(d.is_garbage(), "live descriptor on garbage list");
            assert_eq!(d.prev_garbage, prev, "garbage list back-link broken");
            reached += 1;
            prev = idx;
            idx = d.next_garbage;
        }
        assert_eq!(prev, self.garbage_back(), "garbage back endpoint broken");
        assert_eq!(reached, garbage, "garbage list misses descriptors");

        let cached = self.last_found();
        if cached != NIL {
            assert!((cached as usize) < count, "last-found out of range");
            assert!(!self.desc(cached).is_garbage(), "last-found points at garbage");
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    pub(crate) fn assert_consistent(&self) {}
}

impl core::fmt::Debug for Store<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Store")
            .field("size", &self.size())
            .field("hunk_size", &self.hunk_size())
            .field("count", &self.count())
            .field("garbage_count", &self.garbage_count())
            .field("size_used", &self.size_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_rejects_bad_buffers() {
        let mut tiny = [0u8; 16];
        assert_eq!(Store::init(&mut tiny, 4).unwrap_err(), Error::BadBuffer);

        let mut buf = [0u8; 256];
        assert_eq!(Store::init(&mut buf, 0).unwrap_err(), Error::BadBuffer);
        assert!(Store::init(&mut buf, 1).is_ok());
    }

    #[test]
    fn test_basic_crud_cycle() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        assert!(store.create(b"foo", &[1, 2]).is_ok());
        let mut out = [0u8; 2];
        store.read(b"foo", &mut out).unwrap();
        assert_eq!(out, [1, 2]);

        store.update(b"foo", &[3, 2]).unwrap();
        store.read(b"foo", &mut out).unwrap();
        assert_eq!(out, [3, 2]);

        store.delete(b"foo");
        assert_eq!(store.read(b"foo", &mut out).unwrap_err(), Error::KeyNotFound);
    }

    #[test]
    fn test_create_existing_key_is_rejected() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"k", &[1]).unwrap();
        assert_eq!(store.create(b"k", &[9]).unwrap_err(), Error::KeyExists);
        assert_eq!(store.get(b"k"), Some(&[1][..]));
    }

    #[test]
    fn test_update_size_mismatch_leaves_value() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"k", &[1, 2]).unwrap();
        assert_eq!(store.update(b"k", &[1, 2, 3]).unwrap_err(), Error::BadSize);
        assert_eq!(store.get(b"k"), Some(&[1, 2][..]));
    }

    #[test]
    fn test_read_size_mismatch() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"k", &[1, 2]).unwrap();
        let mut out = [0u8; 3];
        assert_eq!(store.read(b"k", &mut out).unwrap_err(), Error::BadSize);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"k", &[1]).unwrap();
        store.delete(b"k");
        store.delete(b"k");
        store.delete(b"nvr");
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_read_size() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"k", &[1, 2, 3]).unwrap();
        assert_eq!(store.read_size(b"k"), 3);
        assert_eq!(store.read_size(b"missing"), 0);
    }

    #[test]
    fn test_fill_to_capacity() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        let mut created = 0usize;
        for i in 0..200u32 {
            let key = [b'a' + (i / 26 % 26) as u8, b'a' + (i % 26) as u8];
            match store.create(&key, &[i as u8]) {
                Ok(()) => {
                    created += 1;
                    assert_eq!(store.count(), created);
                }
                Err(Error::OutOfSpace) => break,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert!(created > 0);
        assert!(store.size_used() <= store.size());

        // One more create of the same shape must keep failing.
        assert_eq!(store.create(b"zz", &[0]).unwrap_err(), Error::OutOfSpace);
        assert_eq!(store.count(), created);
    }

    #[test]
    fn test_empty_keeps_bookkeeping() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"a", &[1]).unwrap();
        store.create(b"b", &[2]).unwrap();
        store.empty();

        assert_eq!(store.count(), 0);
        assert!(store.is_empty());
        assert!(store.get(b"a").is_none());
        assert!(store.garbage_size() > 0);

        // The namespace is free again.
        store.create(b"a", &[9]).unwrap();
        assert_eq!(store.get(b"a"), Some(&[9][..]));
    }

    #[test]
    fn test_clear_resets() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"a", &[1]).unwrap();
        store.clear();

        assert_eq!(store.count(), 0);
        assert_eq!(store.size_used(), store.head_size());
        assert_eq!(store.garbage_size(), 0);
    }

    #[test]
    fn test_recycle_exact_match() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"a", &[1, 2, 3, 4]).unwrap();
        store.create(b"b", &[5]).unwrap();
        let used_before = store.size_used();

        store.delete(b"a");
        // Same payload shape: must reuse the garbage hunk, not grow the heap.
        store.create(b"c", &[7, 8, 9, 9]).unwrap();
        assert_eq!(store.size_used(), used_before);
        assert_eq!(store.get(b"c"), Some(&[7, 8, 9, 9][..]));
        assert_eq!(store.get(b"b"), Some(&[5][..]));
    }

    #[test]
    fn test_attach_round_trip() {
        let mut buf = [0u8; 1024];
        {
            let mut store = Store::init(&mut buf, 4).unwrap();
            store.create(b"a", &[1, 2]).unwrap();
            store.create(b"b", &[3]).unwrap();
        }
        let store = Store::attach(&mut buf).unwrap();
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(b"a"), Some(&[1, 2][..]));

        let mut junk = [0u8; 1024];
        assert_eq!(Store::attach(&mut junk).unwrap_err(), Error::BadBuffer);
    }

    #[test]
    fn test_copy_from() {
        let mut src_buf = [0u8; 1024];
        let mut dst_buf = [0u8; 1024];
        let mut src = Store::init(&mut src_buf, 4).unwrap();
        let mut dst = Store::init(&mut dst_buf, 4).unwrap();

        src.create(b"a", &[1]).unwrap();
        src.create(b"b", &[2, 3]).unwrap();
        src.delete(b"a");

        dst.copy_from(&src).unwrap();
        assert_eq!(dst.count(), 1);
        assert_eq!(dst.get(b"b"), Some(&[2, 3][..]));
        assert!(dst.get(b"a").is_none());
    }

    #[test]
    fn test_copy_from_out_of_space() {
        let mut src_buf = [0u8; 1024];
        let mut dst_buf = [0u8; 96];
        let mut src = Store::init(&mut src_buf, 4).unwrap();
        let mut dst = Store::init(&mut dst_buf, 4).unwrap();

        src.create(b"a", &[1; 8]).unwrap();
        src.create(b"b", &[2; 8]).unwrap();

        assert!(dst.copy_from(&src).is_err());
    }

    #[test]
    fn test_bad_keys() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        assert_eq!(store.create(b"", &[1]).unwrap_err(), Error::BadKey);
        assert_eq!(
            store.create(b"waytoolongkey", &[1]).unwrap_err(),
            Error::BadKey
        );
        assert_eq!(store.create(b"a\0b", &[1]).unwrap_err(), Error::BadKey);
    }

    #[test]
    fn test_max_count() {
        let mut buf = [0u8; 1024];
        let store = Store::init(&mut buf, 4).unwrap();

        let per = DESC_SIZE + 8;
        assert_eq!(store.max_count(8), (1024 - HEADER_SIZE) / per);
        assert!(store.max_count(1) >= store.max_count(64));
    }
}
