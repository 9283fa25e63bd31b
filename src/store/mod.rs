//! Datastore layer: the arena controller and everything that consults it
//! (key lookup, the garbage list, the collector, sorts, the iterator).

mod find;
mod garbage;
mod gc;
mod iter;
mod sort;
#[allow(clippy::module_inception)]
mod store;

pub use iter::{Entries, Entry};
pub use store::Store;
