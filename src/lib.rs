//! # hunkstore
//!
//! Embedded key-value datastore inside a caller-supplied byte buffer.
//! No allocation, no I/O, no background work.
//!
//! ## Features
//! - Fixed memory footprint: everything lives in one `&mut [u8]`
//! - Bidirectional layout: descriptor stack grows up, value heap grows down
//! - Explicit, byte-bounded garbage collection (pop/merge/fold/pack)
//! - Exact-size hunk recycling on create
//! - no_std compatible (no alloc required)
//!
//! ## Example
//! ```rust
//! use hunkstore::Store;
//!
//! let mut buf = [0u8; 1024];
//! let mut store = Store::init(&mut buf, 4).unwrap();
//!
//! store.create(b"foo", &[1, 2]).unwrap();
//! store.update(b"foo", &[3, 2]).unwrap();
//! assert_eq!(store.get(b"foo"), Some(&[3, 2][..]));
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

mod arena;
mod constants;
mod error;
mod stats;
mod store;

pub mod json;

pub use constants::{MAX_KEY_LENGTH, MAX_SIZE};
pub use error::{code_of, is_error, Error, Result};
pub use stats::Stats;
pub use store::{Entries, Entry, Store};
