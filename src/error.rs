//! Error types for hunkstore operations.

use thiserror::Error;

/// Errors returned by datastore operations.
///
/// The set is closed and each variant maps onto a small stable integer code
/// (see [`Error::code`]), mirroring the return-code convention used by
/// embedded deployments that route results over a byte protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The supplied buffer cannot host an arena (too small, too large, or
    /// the attach magic does not match).
    #[error("buffer cannot host an arena")]
    BadBuffer,

    /// The key is empty or longer than [`MAX_KEY_LENGTH`](crate::MAX_KEY_LENGTH).
    #[error("key is empty or too long")]
    BadKey,

    /// The arena cannot fit the keyvalue (descriptor stack would cross the
    /// value heap).
    #[error("arena is out of space")]
    OutOfSpace,

    /// No live keyvalue carries the requested key.
    #[error("key not found")]
    KeyNotFound,

    /// A live keyvalue already carries the requested key.
    #[error("key already exists")]
    KeyExists,

    /// The caller-declared value size does not match the stored value size.
    #[error("value size mismatch")]
    BadSize,
}

impl Error {
    /// Stable integer code for this error.
    ///
    /// `0` is reserved for success; every error is negative.
    #[inline]
    pub const fn code(self) -> i32 {
        match self {
            Error::BadBuffer | Error::BadKey | Error::OutOfSpace => -1,
            Error::KeyNotFound => -2,
            Error::KeyExists => -3,
            Error::BadSize => -4,
        }
    }
}

/// Result type for datastore operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Check whether an integer return code denotes an error.
#[inline]
pub const fn is_error(code: i32) -> bool {
    code < 0
}

/// Convert an operation result into its integer code.
///
/// Success maps to `0`, errors to their negative code.
#[inline]
pub fn code_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative_and_stable() {
        assert_eq!(Error::BadBuffer.code(), -1);
        assert_eq!(Error::BadKey.code(), -1);
        assert_eq!(Error::OutOfSpace.code(), -1);
        assert_eq!(Error::KeyNotFound.code(), -2);
        assert_eq!(Error::KeyExists.code(), -3);
        assert_eq!(Error::BadSize.code(), -4);
    }

    #[test]
    fn test_is_error() {
        assert!(!is_error(0));
        assert!(!is_error(7));
        assert!(is_error(-1));
        assert!(is_error(-4));
    }

    #[test]
    fn test_code_of() {
        assert_eq!(code_of(&Ok(())), 0);
        assert_eq!(code_of::<()>(&Err(Error::KeyExists)), -3);
    }
}
