//! Scoped layer ownership
//!
//! A `Session` exists only while its layer is initialized. Dropping it
//! finalizes the layer, so early returns cannot leave the layer up.

use crate::bounded::{Key, Value};
use crate::config::KvsalConfig;
use crate::error::Result;

use super::KvLayer;

/// An initialized KV layer that is finalized when the session ends
pub struct Session<'a, L: KvLayer + ?Sized> {
    layer: &'a L,

    /// Cleared once finalize has run or teardown was given up
    active: bool,
}

impl<'a, L: KvLayer + ?Sized> Session<'a, L> {
    /// Initialize `layer`; the session only exists if that succeeds
    pub fn open(layer: &'a L, config: &KvsalConfig) -> Result<Self> {
        layer.initialize(config)?;
        Ok(Self {
            layer,
            active: true,
        })
    }

    pub fn set(&self, key: &Key, value: &Value) -> Result<()> {
        self.layer.set(key, value)
    }

    /// Finalize the layer and report the outcome
    pub fn finalize(mut self) -> Result<()> {
        self.active = false;
        self.layer.finalize()
    }

    /// End the session without finalizing the layer
    pub fn abandon(mut self) {
        tracing::debug!("Session abandoned, layer left initialized");
        self.active = false;
    }
}

impl<'a, L: KvLayer + ?Sized> Drop for Session<'a, L> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        if let Err(e) = self.layer.finalize() {
            tracing::warn!("Finalize during session teardown failed: {}", e);
        }
    }
}
