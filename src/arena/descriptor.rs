//! Keyvalue descriptor: the fixed-size record binding one key to one hunk.

use crate::arena::{get_u32, set_u32};
use crate::constants::{DESC_SIZE, HEADER_SIZE, MAX_KEY_LENGTH};
use crate::store::Store;

/// Flag bit marking a descriptor as garbage (deleted, awaiting reclaim).
const FLAG_GARBAGE: u32 = 1;

/// Decoded keyvalue descriptor.
///
/// One descriptor exists per logical key and lives in the descriptor stack
/// at the low end of the arena. The descriptor owns one *hunk*: a contiguous
/// byte range inside the value heap whose size is a multiple of the arena's
/// hunk granularity.
///
/// # Hunk layout
/// - value bytes at `value_off` (the hunk's low end)
/// - key bytes immediately after, ending with a single NUL terminator
/// - slack, if any, at the hunk's high end
///
/// The trailing NUL lets the key be recovered without a stored length.
///
/// # Garbage links
/// `prev_garbage`/`next_garbage` are descriptor indices forming an intrusive
/// doubly-linked list over garbage descriptors. They are meaningful only
/// while [`KvDesc::is_garbage`] returns true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KvDesc {
    /// Offset of the hunk's lowest byte.
    pub hunk_top: u32,
    /// Hunk size in bytes (multiple of the arena hunk granularity).
    pub hunk_size: u32,
    /// Offset of the value payload inside the hunk.
    pub value_off: u32,
    /// Value payload length in bytes.
    pub value_size: u32,
    /// Offset of the key's NUL-terminated byte string inside the hunk.
    pub key_off: u32,
    /// Lifecycle flags; bit 0 is the garbage flag.
    pub flags: u32,
    /// Previous garbage descriptor index, or `NIL`.
    pub prev_garbage: u32,
    /// Next garbage descriptor index, or `NIL`.
    pub next_garbage: u32,
}

impl KvDesc {
    /// Whether this descriptor is deleted and awaiting reclaim.
    #[inline(always)]
    pub fn is_garbage(&self) -> bool {
        self.flags & FLAG_GARBAGE != 0
    }

    /// Set or clear the garbage flag.
    #[inline(always)]
    pub fn set_garbage(&mut self, garbage: bool) {
        if garbage {
            self.flags |= FLAG_GARBAGE;
        } else {
            self.flags &= !FLAG_GARBAGE;
        }
    }

    /// Decode a descriptor from its stack slot.
    pub fn decode(buf: &[u8], off: usize) -> Self {
        KvDesc {
            hunk_top: get_u32(buf, off),
            hunk_size: get_u32(buf, off + 4),
            value_off: get_u32(buf, off + 8),
            value_size: get_u32(buf, off + 12),
            key_off: get_u32(buf, off + 16),
            flags: get_u32(buf, off + 20),
            prev_garbage: get_u32(buf, off + 24),
            next_garbage: get_u32(buf, off + 28),
        }
    }

    /// Encode a descriptor into its stack slot.
    pub fn encode(&self, buf: &mut [u8], off: usize) {
        set_u32(buf, off, self.hunk_top);
        set_u32(buf, off + 4, self.hunk_size);
        set_u32(buf, off + 8, self.value_off);
        set_u32(buf, off + 12, self.value_size);
        set_u32(buf, off + 16, self.key_off);
        set_u32(buf, off + 20, self.flags);
        set_u32(buf, off + 24, self.prev_garbage);
        set_u32(buf, off + 28, self.next_garbage);
    }

    /// Bytes given back when this keyvalue is popped off the stack:
    /// the hunk plus the descriptor slot itself.
    #[inline(always)]
    pub fn reclaimable_size(&self) -> usize {
        self.hunk_size as usize + DESC_SIZE
    }
}

impl<'b> Store<'b> {
    /// Byte offset of descriptor slot `idx` in the stack.
    #[inline(always)]
    pub(crate) fn desc_offset(&self, idx: u32) -> usize {
        HEADER_SIZE + idx as usize * DESC_SIZE
    }

    /// Decode descriptor `idx`.
    #[inline(always)]
    pub(crate) fn desc(&self, idx: u32) -> KvDesc {
        KvDesc::decode(self.buf, self.desc_offset(idx))
    }

    /// Encode descriptor `idx`.
    #[inline(always)]
    pub(crate) fn set_desc(&mut self, idx: u32, desc: &KvDesc) {
        desc.encode(self.buf, self.desc_offset(idx));
    }

    /// Key bytes of descriptor `idx`, without the NUL terminator.
    ///
    /// Garbage descriptors whose hunk was merged away yield an empty key.
    pub(crate) fn key_bytes(&self, idx: u32) -> &[u8] {
        let d = self.desc(idx);
        let start = d.key_off as usize;
        let bound = (start + MAX_KEY_LENGTH + 1)
            .min(d.hunk_top as usize + d.hunk_size as usize)
            .max(start);
        let region = &self.buf[start..bound];
        let len = region.iter().position(|&b| b == 0).unwrap_or(region.len());
        &region[..len]
    }

    /// Value bytes of descriptor `idx`.
    pub(crate) fn value_bytes(&self, idx: u32) -> &[u8] {
        let d = self.desc(idx);
        let start = d.value_off as usize;
        &self.buf[start..start + d.value_size as usize]
    }

    /// Bytes of the hunk actually in use: value, key, and the NUL terminator.
    pub(crate) fn used_bytes(&self, idx: u32) -> usize {
        self.desc(idx).value_size as usize + self.key_bytes(idx).len() + 1
    }
}
