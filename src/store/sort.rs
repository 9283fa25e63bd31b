//! Descriptor stack reordering.
//!
//! Both sorts move whole descriptor records, so every cached index (the
//! garbage-list links, the endpoints, the last-found slot) goes stale and
//! is rebuilt afterwards. In-place insertion sort: the stack is small and
//! the arena has no scratch space to offer a faster algorithm.

use crate::store::Store;

impl<'b> Store<'b> {
    /// Reorder descriptors by key bytes, ascending.
    ///
    /// Garbage descriptors compare by whatever key bytes their hunk still
    /// holds; emptied ones sort first. Breaks the stack/heap order
    /// correspondence, which [`sort_by_heap`](Store::sort_by_heap) restores.
    pub fn sort_by_key(&mut self) {
        self.sort_stack(|s, a, b| s.key_bytes(a) < s.key_bytes(b));
    }

    /// Reorder descriptors by hunk address, descending.
    ///
    /// Restores the creation-time correspondence (bottom descriptor owns
    /// the highest hunk), the precondition under which merge and pack can
    /// see every contiguous pair.
    pub fn sort_by_heap(&mut self) {
        self.sort_stack(|s, a, b| s.desc(a).hunk_top > s.desc(b).hunk_top);
    }

    fn sort_stack(&mut self, less: fn(&Store<'_>, u32, u32) -> bool) {
        let n = self.stack_count() as u32;
        for i in 1..n {
            let mut j = i;
            while j > 0 && less(self, j, j - 1) {
                self.swap_descs(j, j - 1);
                j -= 1;
            }
        }
        self.garbage_rebuild();
        self.set_last_found(crate::constants::NIL);
        self.assert_consistent();
    }
}
