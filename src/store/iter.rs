//! Iteration over live keyvalues.
//!
//! Entries borrow the store, so the borrow checker pins down the pointer
//! stability contract: any mutating call (in particular fold, pack, the
//! sorts, clear, and empty, which rebind payload bytes) ends every
//! outstanding entry before it can observe a stale offset.

use crate::store::Store;

/// One live keyvalue, borrowed from the store.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'s> {
    key: &'s [u8],
    value: &'s [u8],
}

impl<'s> Entry<'s> {
    /// Key bytes, without the NUL terminator.
    #[inline]
    pub fn key(&self) -> &'s [u8] {
        self.key
    }

    /// Value bytes.
    #[inline]
    pub fn value(&self) -> &'s [u8] {
        self.value
    }

    /// Value length in bytes.
    #[inline]
    pub fn value_size(&self) -> usize {
        self.value.len()
    }
}

/// Iterator over live keyvalues in stack order, oldest first.
#[derive(Debug)]
pub struct Entries<'s, 'b> {
    store: &'s Store<'b>,
    next: u32,
}

impl<'s, 'b> Iterator for Entries<'s, 'b> {
    type Item = Entry<'s>;

    fn next(&mut self) -> Option<Entry<'s>> {
        while (self.next as usize) < self.store.stack_count() {
            let idx = self.next;
            self.next += 1;
            if self.store.desc(idx).is_garbage() {
                continue;
            }
            return Some(Entry {
                key: self.store.key_bytes(idx),
                value: self.store.value_bytes(idx),
            });
        }
        None
    }
}

impl<'b> Store<'b> {
    /// Iterate over live keyvalues, oldest first.
    pub fn iter(&self) -> Entries<'_, 'b> {
        Entries { store: self, next: 0 }
    }
}
