//! Core constants and layout parameters for hunkstore.

/// Sentinel value for an empty/null descriptor index or byte offset.
///
/// Used to indicate:
/// - Empty garbage-list endpoints in the arena header
/// - End of the garbage linked list in descriptor prev/next links
/// - Empty last-found cache slot
pub const NIL: u32 = u32::MAX;

/// Maximum arena size in bytes.
///
/// Every internal reference is a `u32` byte offset from the buffer base,
/// so the arena must stay addressable with 32 bits.
pub const MAX_SIZE: usize = u32::MAX as usize;

/// Maximum key length in bytes, excluding the null terminator.
pub const MAX_KEY_LENGTH: usize = 8;

/// Encoded size of the arena header at the base of the buffer.
pub const HEADER_SIZE: usize = 48;

/// Encoded size of one keyvalue descriptor in the descriptor stack.
pub const DESC_SIZE: usize = 32;

/// Magic word written at the buffer base by `init`, checked by `attach`.
///
/// Doubles as a layout version tag: the low byte changes if the header or
/// descriptor encoding changes.
pub const MAGIC: u32 = u32::from_le_bytes(*b"hkv1");
