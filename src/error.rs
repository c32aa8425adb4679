//! Error types for kvsal
//!
//! Provides a unified error type for the driver and the bundled KV layer
//! backends. Every error carries a kvsal status code: a negative errno value,
//! the way the layer reports failures to its callers.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvsalError
pub type Result<T> = std::result::Result<T, KvsalError>;

/// Unified error type for kvsal operations
#[derive(Debug, Error)]
pub enum KvsalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("cannot open {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed INI in {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("{what} too long: {len} bytes (max {max})")]
    TooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("{what} is not valid UTF-8")]
    InvalidUtf8 { what: &'static str },

    // -------------------------------------------------------------------------
    // Layer Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("KV layer not initialized")]
    NotInitialized,

    #[error("KV layer already initialized")]
    AlreadyInitialized,

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Record log corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A bare status reported by a KV layer implementation
    #[error("KV layer returned status {0}")]
    Status(i32),
}

impl KvsalError {
    /// The kvsal status code for this error (a negative errno)
    pub fn code(&self) -> i32 {
        match self {
            KvsalError::Io(e) | KvsalError::ConfigRead { source: e, .. } => -os_errno(e),
            KvsalError::ConfigParse { .. }
            | KvsalError::Config(_)
            | KvsalError::TooLong { .. }
            | KvsalError::InvalidUtf8 { .. }
            | KvsalError::NotInitialized
            | KvsalError::Serialization(_) => -libc::EINVAL,
            KvsalError::AlreadyInitialized => -libc::EALREADY,
            KvsalError::Corruption(_) => -libc::EIO,
            KvsalError::Status(code) => *code,
        }
    }
}

impl From<bincode::Error> for KvsalError {
    fn from(e: bincode::Error) -> Self {
        KvsalError::Serialization(e.to_string())
    }
}

/// errno carried by an I/O error, EIO when the error did not come from the OS
fn os_errno(e: &io::Error) -> i32 {
    match e.raw_os_error() {
        Some(code) if code != 0 => code,
        _ => libc::EIO,
    }
}
