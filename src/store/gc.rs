//! Garbage collector: pop, merge, fold, pack, collect, clean.
//!
//! The heap grows downward, so the *pop frontier* is the lowest-addressed
//! hunk, owned by the newest descriptor. Only pop gives bytes back to the
//! free gap; fold and pack migrate garbage toward the frontier (live
//! payloads move toward the high, old end) so that pop can reach it, and
//! merge coalesces neighboring garbage hunks so recycling and folding see
//! bigger holes.
//!
//! Every phase is explicit. None of them runs inside a CRUD call, so the
//! caller picks the phases its reference discipline tolerates:
//!
//! - pop never touches live data;
//! - merge rewrites garbage bookkeeping only, live descriptors stay put;
//! - fold and pack rebind live payloads between hunks and therefore
//!   invalidate every outstanding payload reference (the borrow checker
//!   enforces this: all of them take `&mut self`).

use log::{debug, trace};

use crate::arena::KvDesc;
use crate::constants::NIL;
use crate::store::Store;

impl<'b> Store<'b> {
    /// Pop garbage keyvalues off the top of the stack, newest first.
    ///
    /// The cheapest phase: it only ever shrinks the two bump allocators.
    /// Stops at the first live descriptor, at the first garbage hunk that
    /// does not sit at the heap top, or when the next keyvalue would push
    /// the total past `limit` (a keyvalue is reclaimed whole or not at
    /// all). Returns bytes reclaimed.
    pub fn gc_pop(&mut self, limit: usize) -> usize {
        let reclaimed = self.pop_garbage(limit);
        if reclaimed > 0 {
            debug!("gc_pop: reclaimed {} bytes", reclaimed);
        }
        self.assert_consistent();
        reclaimed
    }

    /// Coalesce neighboring garbage hunks.
    ///
    /// Walks the stack once; each maximal run of stack-adjacent garbage
    /// descriptors whose hunks are contiguous in heap order collapses into
    /// the run's last descriptor. The emptied descriptors keep their slots
    /// (hunk size zero) so live descriptor addresses never move. Most
    /// effective right after [`sort_by_heap`](Store::sort_by_heap).
    /// Returns the total size of the coalesced hunks.
    pub fn merge(&mut self) -> usize {
        let count = self.stack_count() as u32;
        let mut merged = 0usize;
        let mut i = 0u32;

        while i < count {
            let first = self.desc(i);
            if !first.is_garbage() {
                i += 1;
                continue;
            }

            // Extend the run downward in address order (upward in stack
            // order); zero-size descriptors ride along for free.
            let mut run_low = first.hunk_top as usize;
            let mut run_size = first.hunk_size as usize;
            let mut hunks = usize::from(first.hunk_size != 0);
            let mut j = i;
            while j + 1 < count {
                let next = self.desc(j + 1);
                if !next.is_garbage() {
                    break;
                }
                if next.hunk_size != 0 {
                    if next.hunk_top as usize + next.hunk_size as usize != run_low {
                        break;
                    }
                    run_low = next.hunk_top as usize;
                    run_size += next.hunk_size as usize;
                    hunks += 1;
                }
                j += 1;
            }

            if hunks >= 2 {
                for k in i..=j {
                    let mut d = self.desc(k);
                    if k == j {
                        d.hunk_top = run_low as u32;
                        d.hunk_size = run_size as u32;
                    } else {
                        d.hunk_size = 0;
                    }
                    self.set_desc(k, &d);
                }
                merged += run_size;
                trace!("merge: {} hunks -> {} bytes at {}", hunks, run_size, run_low);
            }
            i = j + 1;
        }

        if merged > 0 {
            self.set_last_found(NIL);
            debug!("merge: coalesced {} bytes", merged);
        }
        self.assert_consistent();
        merged
    }

    /// Move live payloads down into garbage holes of equal hunk size.
    ///
    /// For each garbage descriptor, bottom up, the newest live descriptor
    /// above it with exactly matching hunk size is copied into the hole and
    /// the two descriptors swap roles. Garbage thereby migrates toward the
    /// pop frontier; a trailing pop hands back whatever reached it.
    /// Invalidates outstanding payload references. Returns bytes folded.
    pub fn gc_fold(&mut self, limit: usize) -> usize {
        let folded = self.fold_swaps(limit);
        let popped = self.pop_garbage(limit);
        if folded > 0 || popped > 0 {
            debug!("gc_fold: folded {} bytes, reclaimed {}", folded, popped);
        }
        self.assert_consistent();
        folded
    }

    /// Slide live payloads across adjacent garbage hunks.
    ///
    /// Walks adjacent descriptor pairs top-down. Where a garbage descriptor
    /// sits directly below a live one in stack order and their hunks are
    /// contiguous, the live payload moves into the high end of the combined
    /// region and the two descriptors swap hunk accounting. Unlike fold,
    /// no size match is needed, so pack is what ultimately flushes oddly
    /// sized holes. Invalidates outstanding payload references. Returns the
    /// garbage bytes moved toward the frontier.
    pub fn gc_pack(&mut self, limit: usize) -> usize {
        let packed = self.pack_swaps(limit);
        let popped = self.pop_garbage(limit);
        if packed > 0 || popped > 0 {
            debug!("gc_pack: bubbled {} bytes, reclaimed {}", packed, popped);
        }
        self.assert_consistent();
        packed
    }

    /// Composite collection: pop, then fold, then pack, repeating until
    /// `limit` bytes came back or a full round makes no progress.
    /// Returns bytes reclaimed.
    pub fn collect(&mut self, limit: usize) -> usize {
        let mut reclaimed = self.pop_garbage(limit);

        while reclaimed < limit && self.garbage_count() > 0 {
            let folded = self.fold_swaps(limit - reclaimed);
            let after_fold = self.pop_garbage(limit - reclaimed);
            reclaimed += after_fold;
            if reclaimed >= limit || self.garbage_count() == 0 {
                break;
            }

            let packed = self.pack_swaps(limit - reclaimed);
            let after_pack = self.pop_garbage(limit - reclaimed);
            reclaimed += after_pack;

            if folded == 0 && packed == 0 && after_fold == 0 && after_pack == 0 {
                break;
            }
        }

        debug!("collect: reclaimed {} of {} requested", reclaimed, limit);
        self.assert_consistent();
        reclaimed
    }

    /// Collect everything: afterwards `garbage_size() == 0`.
    ///
    /// Sorts the stack into heap order first so pack's contiguity test can
    /// always bubble the remaining holes to the frontier. Returns bytes
    /// reclaimed.
    pub fn clean(&mut self) -> usize {
        if self.garbage_count() == 0 {
            return 0;
        }
        self.sort_by_heap();
        let reclaimed = self.collect(self.garbage_size());
        debug_assert_eq!(self.garbage_size(), 0, "clean left garbage behind");
        reclaimed
    }

    /// Pop loop shared by the public phases.
    fn pop_garbage(&mut self, limit: usize) -> usize {
        let mut reclaimed = 0usize;

        while let Some(top) = self.top_index() {
            let d = self.desc(top);
            if !d.is_garbage() {
                break;
            }
            let kv_size = d.reclaimable_size();
            if reclaimed + kv_size > limit {
                break;
            }
            if d.hunk_size != 0 && d.hunk_top as usize != self.heap_top() {
                break;
            }

            self.garbage_detach(top);
            self.heap_pop(d.hunk_size as usize);
            self.pop_desc();
            reclaimed += kv_size;
            trace!("pop: descriptor {} gave back {} bytes", top, kv_size);
        }
        reclaimed
    }

    /// Role-swap pass of fold; no bytes are given back here.
    fn fold_swaps(&mut self, limit: usize) -> usize {
        let count = self.stack_count() as u32;
        let mut folded = 0usize;

        for gi in 0..count {
            let g = self.desc(gi);
            if !g.is_garbage() || g.hunk_size == 0 {
                continue;
            }

            let mut ti = count;
            while ti > gi + 1 {
                ti -= 1;
                let t = self.desc(ti);
                if t.is_garbage() || t.hunk_size != g.hunk_size {
                    continue;
                }
                if folded + t.reclaimable_size() > limit {
                    break;
                }

                let used = self.used_bytes(ti);
                self.buf.copy_within(
                    t.hunk_top as usize..t.hunk_top as usize + used,
                    g.hunk_top as usize,
                );

                let new_live = KvDesc {
                    hunk_top: g.hunk_top,
                    hunk_size: g.hunk_size,
                    value_off: g.hunk_top,
                    value_size: t.value_size,
                    key_off: g.hunk_top + t.value_size,
                    flags: 0,
                    prev_garbage: NIL,
                    next_garbage: NIL,
                };
                let mut new_garbage = KvDesc {
                    hunk_top: t.hunk_top,
                    hunk_size: t.hunk_size,
                    value_off: t.value_off,
                    value_size: t.value_size,
                    key_off: t.key_off,
                    flags: 0,
                    prev_garbage: g.prev_garbage,
                    next_garbage: g.next_garbage,
                };
                new_garbage.set_garbage(true);

                self.set_desc(gi, &new_live);
                self.set_desc(ti, &new_garbage);
                self.garbage_replace(ti);
                self.set_last_found(NIL);

                folded += new_garbage.reclaimable_size();
                trace!("fold: descriptor {} folded into hole {}", ti, gi);
                break;
            }
        }
        folded
    }

    /// Bubble pass of pack; each hole moves one slot toward the frontier
    /// per call. No bytes are given back here.
    fn pack_swaps(&mut self, limit: usize) -> usize {
        let count = self.stack_count() as u32;
        let mut packed = 0usize;
        if count < 2 {
            return 0;
        }

        let mut i = count - 1;
        while i >= 1 {
            let dest = self.desc(i - 1);
            let src = self.desc(i);
            if !dest.is_garbage() || src.is_garbage() {
                i -= 1;
                continue;
            }

            if dest.hunk_size == 0 {
                // Slot-only hole: swap the records and patch the list.
                self.swap_descs(i - 1, i);
                self.garbage_replace(i);
                self.set_last_found(NIL);
                trace!("pack: empty hole bubbled to slot {}", i);
                i -= 1;
                continue;
            }

            let s = src.hunk_top as usize;
            let ss = src.hunk_size as usize;
            let ds = dest.hunk_size as usize;
            if s + ss != dest.hunk_top as usize {
                // Not contiguous; pack cannot slide across a gap.
                i -= 1;
                continue;
            }
            if packed + ds > limit {
                break;
            }

            let used = self.used_bytes(i);
            self.buf.copy_within(s..s + used, s + ds);

            let new_live = KvDesc {
                hunk_top: (s + ds) as u32,
                hunk_size: ss as u32,
                value_off: (s + ds) as u32,
                value_size: src.value_size,
                key_off: (s + ds) as u32 + src.value_size,
                flags: 0,
                prev_garbage: NIL,
                next_garbage: NIL,
            };
            let mut new_garbage = KvDesc {
                hunk_top: s as u32,
                hunk_size: ds as u32,
                value_off: s as u32,
                value_size: 0,
                key_off: s as u32,
                flags: 0,
                prev_garbage: dest.prev_garbage,
                next_garbage: dest.next_garbage,
            };
            new_garbage.set_garbage(true);

            self.set_desc(i - 1, &new_live);
            self.set_desc(i, &new_garbage);
            self.garbage_replace(i);
            self.set_last_found(NIL);

            packed += ds;
            trace!("pack: {}-byte hole slid under descriptor {}", ds, i - 1);
            i -= 1;
        }
        packed
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::DESC_SIZE;
    use crate::{Error, Store};

    /// One keyvalue with a 1-byte key and 2-byte value in a 4-byte-hunk
    /// arena: 4 hunk bytes plus the descriptor slot.
    const KV_RECLAIM: usize = 4 + DESC_SIZE;

    fn store_with<'b>(buf: &'b mut [u8; 1024], keys: &[&[u8]]) -> Store<'b> {
        let mut store = Store::init(buf, 4).unwrap();
        for (i, key) in keys.iter().enumerate() {
            store.create(key, &[i as u8, 0xAA]).unwrap();
        }
        store
    }

    #[test]
    fn test_pop_reclaims_top_garbage() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2"]);

        store.delete(b"2");
        let garbage = store.garbage_size();
        assert_eq!(garbage, KV_RECLAIM);

        let reclaimed = store.gc_pop(garbage);
        assert_eq!(reclaimed, KV_RECLAIM);
        assert_eq!(store.garbage_size(), 0);
        assert_eq!(store.get(b"1"), Some(&[0, 0xAA][..]));
    }

    #[test]
    fn test_pop_refuses_partial_keyvalue() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2"]);

        store.delete(b"2");
        let garbage = store.garbage_size();

        assert_eq!(store.gc_pop(garbage - 1), 0);
        assert_eq!(store.garbage_size(), garbage);
    }

    #[test]
    fn test_pop_stops_at_live_top() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2"]);

        store.delete(b"1");
        assert_eq!(store.gc_pop(usize::MAX), 0);
        assert!(store.garbage_size() > 0);
        assert_eq!(store.get(b"2"), Some(&[1, 0xAA][..]));
    }

    #[test]
    fn test_pop_cascades_over_garbage_run() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3"]);

        store.delete(b"2");
        store.delete(b"3");
        let reclaimed = store.gc_pop(usize::MAX);
        assert_eq!(reclaimed, 2 * KV_RECLAIM);
        assert_eq!(store.garbage_size(), 0);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_merge_coalesces_contiguous_garbage() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3", b"4"]);

        store.delete(b"2");
        store.delete(b"3");
        let garbage_before = store.garbage_size();

        store.sort_by_heap();
        let merged = store.merge();
        assert_eq!(merged, 8); // the two middle 4-byte hunks

        // Merge reclaims nothing by itself; it only rearranges bookkeeping.
        assert_eq!(store.garbage_size(), garbage_before);
        assert_eq!(store.get(b"1"), Some(&[0, 0xAA][..]));
        assert_eq!(store.get(b"4"), Some(&[3, 0xAA][..]));

        // The merged hole recycles as one larger hunk.
        store.create(b"x", &[9; 6]).unwrap(); // needs 8 bytes
        assert_eq!(store.get(b"x"), Some(&[9; 6][..]));
    }

    #[test]
    fn test_merge_skips_non_adjacent_garbage() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3"]);

        store.delete(b"1");
        store.delete(b"3");
        assert_eq!(store.merge(), 0);
    }

    #[test]
    fn test_fold_preserves_live_data() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3"]);

        store.delete(b"1");
        let garbage_before = store.garbage_size();

        let folded = store.gc_fold(usize::MAX);
        assert_eq!(folded, KV_RECLAIM);
        assert!(store.garbage_size() < garbage_before);
        assert_eq!(store.get(b"2"), Some(&[1, 0xAA][..]));
        assert_eq!(store.get(b"3"), Some(&[2, 0xAA][..]));
    }

    #[test]
    fn test_fold_needs_exact_size_match() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"big", &[1; 10]).unwrap(); // 12-byte hunk
        store.create(b"s1", &[2, 2]).unwrap(); // 4-byte hunk
        store.create(b"s2", &[3, 3]).unwrap(); // 4-byte hunk
        store.delete(b"big");

        assert_eq!(store.gc_fold(usize::MAX), 0);
        assert_eq!(store.get(b"s1"), Some(&[2, 2][..]));
        assert_eq!(store.get(b"s2"), Some(&[3, 3][..]));
    }

    #[test]
    fn test_pack_slides_hole_to_frontier() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"hole", &[1; 10]).unwrap(); // 12-byte hunk, bottom
        store.create(b"a", &[2, 2]).unwrap();
        store.create(b"b", &[3, 3]).unwrap();
        store.delete(b"hole");
        let garbage = store.garbage_size();
        assert_eq!(garbage, 12 + DESC_SIZE);

        // Fold cannot help (no size match); pack slides the hole down one
        // slot per call until pop reaches it.
        store.gc_pack(usize::MAX);
        store.gc_pack(usize::MAX);
        assert_eq!(store.garbage_size(), 0);
        assert_eq!(store.get(b"a"), Some(&[2, 2][..]));
        assert_eq!(store.get(b"b"), Some(&[3, 3][..]));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_collect_meets_limit_and_stops() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3", b"4"]);

        store.delete(b"3");
        store.delete(b"4");

        let reclaimed = store.collect(KV_RECLAIM);
        assert_eq!(reclaimed, KV_RECLAIM);
        assert_eq!(store.garbage_size(), KV_RECLAIM);
    }

    #[test]
    fn test_clean_reclaims_everything() {
        let mut buf = [0u8; 1024];
        let mut store = Store::init(&mut buf, 4).unwrap();

        store.create(b"a", &[1; 3]).unwrap();
        store.create(b"b", &[2; 7]).unwrap();
        store.create(b"c", &[3; 2]).unwrap();
        store.create(b"d", &[4; 11]).unwrap();
        store.create(b"e", &[5; 2]).unwrap();

        store.delete(b"b");
        store.delete(b"d");
        assert!(store.garbage_size() > 0);

        let reclaimed = store.clean();
        assert!(reclaimed > 0);
        assert_eq!(store.garbage_size(), 0);
        assert_eq!(store.garbage_count(), 0);
        assert_eq!(store.count(), 3);
        assert_eq!(store.get(b"a"), Some(&[1; 3][..]));
        assert_eq!(store.get(b"c"), Some(&[3; 2][..]));
        assert_eq!(store.get(b"e"), Some(&[5; 2][..]));
    }

    #[test]
    fn test_clean_after_merge_flushes_empty_slots() {
        let mut buf = [0u8; 1024];
        let mut store = store_with(&mut buf, &[b"1", b"2", b"3", b"4"]);

        store.delete(b"2");
        store.delete(b"3");
        store.sort_by_heap();
        store.merge();

        store.clean();
        assert_eq!(store.garbage_size(), 0);
        assert_eq!(store.count(), 2);
        assert_eq!(store.get(b"1"), Some(&[0, 0xAA][..]));
        assert_eq!(store.get(b"4"), Some(&[3, 0xAA][..]));
    }

    #[test]
    fn test_gc_after_out_of_space_makes_room() {
        let mut buf = [0u8; 256];
        let mut store = Store::init(&mut buf, 4).unwrap();

        let mut keys = std::vec::Vec::new();
        for i in 0..100u8 {
            let key = [b'a' + i % 26, b'a' + i / 26];
            if store.create(&key, &[i, i]).is_err() {
                break;
            }
            keys.push(key);
        }
        assert!(keys.len() >= 2);
        assert_eq!(store.create(b"zz", &[1, 1]).unwrap_err(), Error::OutOfSpace);

        // A deleted keyvalue of the same shape is recycled in place.
        let victim = keys[keys.len() / 2];
        store.delete(&victim);
        store.create(b"zz", &[7, 7]).unwrap();
        assert_eq!(store.get(b"zz"), Some(&[7, 7][..]));

        // Deleting and cleaning gives the bytes back to the free gap.
        store.delete(b"zz");
        store.clean();
        assert_eq!(store.garbage_size(), 0);
        store.create(b"zz", &[8, 8]).unwrap();
    }
}
