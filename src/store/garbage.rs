//! Intrusive doubly-linked list over garbage descriptors.
//!
//! The links live inside the descriptors themselves (`prev_garbage` /
//! `next_garbage` indices); the header keeps both endpoints plus running
//! count and byte totals so `garbage_count`/`garbage_size` stay O(1).
//! The list is an optimization for recycling and collection; the key
//! namespace behaves identically without it, at the cost of O(n) scans.

use crate::constants::NIL;
use crate::store::Store;

impl<'b> Store<'b> {
    /// Append descriptor `idx` to the back of the garbage list.
    ///
    /// The descriptor must already carry the garbage flag.
    pub(crate) fn garbage_attach(&mut self, idx: u32) {
        let mut d = self.desc(idx);
        debug_assert!(d.is_garbage(), "attach of live descriptor");

        let back = self.garbage_back();
        d.prev_garbage = back;
        d.next_garbage = NIL;
        self.set_desc(idx, &d);

        if back == NIL {
            self.set_garbage_front(idx);
        } else {
            let mut b = self.desc(back);
            b.next_garbage = idx;
            self.set_desc(back, &b);
        }
        self.set_garbage_back(idx);
        self.set_garbage_count(self.garbage_count() + 1);
        self.set_garbage_bytes(self.garbage_size() + d.reclaimable_size());
    }

    /// Unlink descriptor `idx` from the garbage list.
    ///
    /// Leaves the garbage flag untouched; the caller decides whether the
    /// descriptor is being recycled or popped.
    pub(crate) fn garbage_detach(&mut self, idx: u32) {
        let d = self.desc(idx);
        debug_assert!(d.is_garbage(), "detach of live descriptor");

        if d.prev_garbage == NIL {
            self.set_garbage_front(d.next_garbage);
        } else {
            let mut p = self.desc(d.prev_garbage);
            p.next_garbage = d.next_garbage;
            self.set_desc(d.prev_garbage, &p);
        }
        if d.next_garbage == NIL {
            self.set_garbage_back(d.prev_garbage);
        } else {
            let mut n = self.desc(d.next_garbage);
            n.prev_garbage = d.prev_garbage;
            self.set_desc(d.next_garbage, &n);
        }
        self.set_garbage_count(self.garbage_count() - 1);
        self.set_garbage_bytes(self.garbage_size() - d.reclaimable_size());
    }

    /// Point the neighbors and endpoints that referenced `old_idx` at
    /// `new_idx` instead.
    ///
    /// Used when fold or pack hands the garbage role from one descriptor to
    /// another: `new_idx` keeps the list position `old_idx` held, so its
    /// slot must already carry the links copied from the old descriptor.
    /// Count and byte totals are the caller's concern (a role swap moves
    /// hunk accounting along with the links, so they usually don't change).
    pub(crate) fn garbage_replace(&mut self, new_idx: u32) {
        let d = self.desc(new_idx);
        debug_assert!(d.is_garbage(), "replacement must be garbage");

        if d.prev_garbage == NIL {
            self.set_garbage_front(new_idx);
        } else {
            let mut p = self.desc(d.prev_garbage);
            p.next_garbage = new_idx;
            self.set_desc(d.prev_garbage, &p);
        }
        if d.next_garbage == NIL {
            self.set_garbage_back(new_idx);
        } else {
            let mut n = self.desc(d.next_garbage);
            n.prev_garbage = new_idx;
            self.set_desc(d.next_garbage, &n);
        }
    }

    /// Rebuild the list from the stack after a reorder.
    ///
    /// Sorting moves descriptor records wholesale, so every stored link is
    /// stale afterwards. One bottom-up sweep re-links the garbage
    /// descriptors in stack order and refreshes the running totals.
    pub(crate) fn garbage_rebuild(&mut self) {
        self.set_garbage_front(NIL);
        self.set_garbage_back(NIL);
        self.set_garbage_count(0);
        self.set_garbage_bytes(0);

        for idx in 0..self.stack_count() as u32 {
            if self.desc(idx).is_garbage() {
                self.garbage_attach(idx);
            }
        }
    }
}
