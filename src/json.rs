//! Informational JSON emitters.
//!
//! Keys can be written raw or double-quoted; values raw or hex-escaped
//! between single quotes. Output goes to any [`core::fmt::Write`] sink, so
//! the emitters work without an allocator. The output is for humans and
//! log lines; it is not a wire format.

use core::fmt::{self, Write};

use crate::store::{Entry, Store};

/// How to emit key bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Bytes as-is, unquoted.
    Raw,
    /// Bytes between double quotes.
    Quoted,
}

/// How to emit value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Bytes as-is, unquoted.
    Raw,
    /// Lowercase hex pairs between single quotes.
    Hex,
}

/// Printable ASCII passes through; everything else becomes `\xNN`.
fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> fmt::Result {
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' {
            w.write_char(b as char)?;
        } else {
            write!(w, "\\x{b:02x}")?;
        }
    }
    Ok(())
}

/// Emit one `key: value` pair in the chosen formats.
pub fn write_entry<W: Write>(
    w: &mut W,
    entry: &Entry<'_>,
    key_format: KeyFormat,
    value_format: ValueFormat,
) -> fmt::Result {
    match key_format {
        KeyFormat::Raw => write_bytes(w, entry.key())?,
        KeyFormat::Quoted => {
            w.write_char('"')?;
            write_bytes(w, entry.key())?;
            w.write_char('"')?;
        }
    }
    w.write_str(": ")?;
    match value_format {
        ValueFormat::Raw => write_bytes(w, entry.value())?,
        ValueFormat::Hex => {
            w.write_char('\'')?;
            for &b in entry.value() {
                write!(w, "{b:02x}")?;
            }
            w.write_char('\'')?;
        }
    }
    Ok(())
}

/// Emit every live keyvalue as one JSON-ish object.
pub fn write_store<W: Write>(
    w: &mut W,
    store: &Store<'_>,
    key_format: KeyFormat,
    value_format: ValueFormat,
) -> fmt::Result {
    w.write_char('{')?;
    let mut first = true;
    for entry in store.iter() {
        if !first {
            w.write_str(", ")?;
        }
        first = false;
        write_entry(w, &entry, key_format, value_format)?;
    }
    w.write_char('}')
}
