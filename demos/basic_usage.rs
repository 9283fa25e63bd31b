//! Basic usage example for hunkstore.
//!
//! This example walks through the core lifecycle: create, read, update,
//! delete, and explicit garbage collection.

use hunkstore::json::{self, KeyFormat, ValueFormat};
use hunkstore::Store;

fn main() {
    println!("=== hunkstore - Basic Usage Example ===\n");

    // The datastore lives entirely inside this buffer.
    let mut buf = [0u8; 1024];
    let mut store = Store::init(&mut buf, 4).unwrap();
    println!("Initialized a {}-byte arena", store.size());

    // Store some keyvalues
    println!("\nCreating keys: sensor, limit, mode");
    store.create(b"sensor", &[0x12, 0x34]).unwrap();
    store.create(b"limit", &[200]).unwrap();
    store.create(b"mode", b"eco").unwrap();
    println!("Store now holds {} keyvalues", store.count());

    // Point reads
    println!("\nReads:");
    println!("  sensor: {:?}", store.get(b"sensor"));
    println!("  absent: {:?}", store.get(b"absent"));
    println!("  read_size(mode): {}", store.read_size(b"mode"));

    // In-place update (same size)
    store.update(b"sensor", &[0x56, 0x78]).unwrap();
    println!("\nAfter update: sensor = {:?}", store.get(b"sensor"));

    // Iterate in stack order
    println!("\nIteration:");
    for entry in store.iter() {
        println!(
            "  {} = {:?} ({} bytes)",
            String::from_utf8_lossy(entry.key()),
            entry.value(),
            entry.value_size()
        );
    }

    // JSON-ish dump
    let mut out = String::new();
    json::write_store(&mut out, &store, KeyFormat::Quoted, ValueFormat::Hex).unwrap();
    println!("\nDump: {out}");

    // Deletes leave garbage behind; the collector runs only on demand.
    store.delete(b"limit");
    println!("\nAfter delete: {} bytes of garbage", store.garbage_size());
    let reclaimed = store.clean();
    println!("clean() reclaimed {reclaimed} bytes");

    // Usage statistics
    println!("\nStats:\n{}", store.stats());
}
