//! Length-checked strings
//!
//! Keys and values handed to the KV layer have a hard size limit. Input over
//! the limit is rejected instead of being cut short.

use std::fmt;
use std::ops::Deref;

use crate::error::{KvsalError, Result};

/// Size of the layer's key buffer, terminator included
pub const KLEN: usize = 256;

/// Size of the layer's value buffer, terminator included
pub const VLEN: usize = 256;

/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = KLEN - 1;

/// Maximum value length in bytes
pub const MAX_VALUE_LEN: usize = VLEN - 1;

/// An owned string of at most `MAX` bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundedString<const MAX: usize>(String);

/// A key accepted by the KV layer
pub type Key = BoundedString<MAX_KEY_LEN>;

/// A value accepted by the KV layer
pub type Value = BoundedString<MAX_VALUE_LEN>;

impl<const MAX: usize> BoundedString<MAX> {
    /// Largest accepted length in bytes
    pub const MAX_LEN: usize = MAX;

    /// Wrap `s`, failing with `TooLong` if it exceeds `MAX` bytes
    ///
    /// `what` names the argument in the error message.
    pub fn new(what: &'static str, s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.len() > MAX {
            return Err(KvsalError::TooLong {
                what,
                len: s.len(),
                max: MAX,
            });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl<const MAX: usize> Deref for BoundedString<MAX> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> AsRef<str> for BoundedString<MAX> {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<const MAX: usize> fmt::Display for BoundedString<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
