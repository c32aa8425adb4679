//! In-process backend
//!
//! BTreeMap-based store behind a RwLock. Contents live as long as the layer
//! value does and survive finalize, so a caller can inspect what a run wrote.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::bounded::{Key, Value};
use crate::config::KvsalConfig;
use crate::error::{KvsalError, Result};

use super::KvLayer;

/// KV layer that keeps everything in memory
#[derive(Default)]
pub struct MemoryLayer {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// True between initialize and finalize
    active: bool,

    data: BTreeMap<String, String>,

    /// Approximate size of keys plus values, in bytes
    size: usize,
}

impl MemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().data.get(key).cloned()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().data.is_empty()
    }

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.inner.read().size
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().active
    }
}

impl KvLayer for MemoryLayer {
    fn initialize(&self, _config: &KvsalConfig) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.active {
            return Err(KvsalError::AlreadyInitialized);
        }
        inner.active = true;

        tracing::debug!("Memory layer initialized with {} keys", inner.data.len());
        Ok(())
    }

    fn set(&self, key: &Key, value: &Value) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.active {
            return Err(KvsalError::NotInitialized);
        }

        let added = key.len() + value.len();
        match inner.data.insert(key.to_string(), value.to_string()) {
            Some(old) => inner.size = inner.size - key.len() - old.len() + added,
            None => inner.size += added,
        }

        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.active {
            return Err(KvsalError::NotInitialized);
        }
        inner.active = false;

        tracing::debug!("Memory layer finalized");
        Ok(())
    }
}
