//! Backend selection
//!
//! `Backend` is the layer the driver binary talks to. It reads
//! `[kvsal] backend` at initialize time and forwards every call to the
//! backend it started.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;

use crate::bounded::{Key, Value};
use crate::config::{KvsalConfig, KVSAL_SECTION};
use crate::error::{KvsalError, Result};

use super::{FileLayer, KvLayer, MemoryLayer};

/// Bundled backend implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    Memory,

    #[default]
    File,
}

impl FromStr for BackendKind {
    type Err = KvsalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            other => Err(KvsalError::Config(format!(
                "unknown backend '{}' (expected file or memory)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::File => f.write_str("file"),
        }
    }
}

enum Active {
    Memory(MemoryLayer),
    File(FileLayer),
}

impl Active {
    fn layer(&self) -> &dyn KvLayer {
        match self {
            Active::Memory(layer) => layer,
            Active::File(layer) => layer,
        }
    }
}

/// KV layer that dispatches to the backend named in the config
#[derive(Default)]
pub struct Backend {
    active: RwLock<Option<Active>>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The running backend, if initialized
    pub fn kind(&self) -> Option<BackendKind> {
        self.active.read().as_ref().map(|active| match active {
            Active::Memory(_) => BackendKind::Memory,
            Active::File(_) => BackendKind::File,
        })
    }
}

impl KvLayer for Backend {
    fn initialize(&self, config: &KvsalConfig) -> Result<()> {
        let mut active = self.active.write();
        if active.is_some() {
            return Err(KvsalError::AlreadyInitialized);
        }

        let kind = match config.get(KVSAL_SECTION, "backend") {
            Some(s) => s.parse()?,
            None => BackendKind::default(),
        };

        let started = match kind {
            BackendKind::Memory => Active::Memory(MemoryLayer::new()),
            BackendKind::File => Active::File(FileLayer::new()),
        };
        started.layer().initialize(config)?;

        tracing::debug!("Backend '{}' initialized", kind);
        *active = Some(started);
        Ok(())
    }

    fn set(&self, key: &Key, value: &Value) -> Result<()> {
        let active = self.active.read();
        let active = active.as_ref().ok_or(KvsalError::NotInitialized)?;
        active.layer().set(key, value)
    }

    fn finalize(&self) -> Result<()> {
        let active = self.active.write().take().ok_or(KvsalError::NotInitialized)?;
        active.layer().finalize()
    }
}
