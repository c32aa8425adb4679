//! KV Layer Module
//!
//! The key-value abstraction layer the driver exercises.
//!
//! ## Responsibilities
//! - `KvLayer`: the capability set every layer offers (initialize/set/finalize)
//! - `Session`: scoped ownership of an initialized layer
//! - Bundled backends, selected from the `[kvsal]` config section
//!
//! ## Lifecycle
//! ```text
//!   initialize(config) ──► set(key, value)* ──► finalize()
//! ```
//! A layer is initialized once per run and torn down once. Calling `set` or
//! `finalize` outside that window is a `NotInitialized` error.

mod session;
mod memory;
mod record;
mod file;
mod backend;

pub use session::Session;
pub use memory::MemoryLayer;
pub use record::{Decoded, Record, HEADER_SIZE};
pub use file::{FileLayer, Replay, SyncPolicy, DEFAULT_DATA_DIR, LOG_FILENAME};
pub use backend::{Backend, BackendKind};

use crate::bounded::{Key, Value};
use crate::config::KvsalConfig;
use crate::error::Result;

/// Capability set of a key-value abstraction layer
///
/// All methods take `&self`: layers keep their process-wide state behind
/// internal locks, so a layer can be shared by reference with a `Session`.
pub trait KvLayer {
    /// Bring the layer up using the options in `config`
    fn initialize(&self, config: &KvsalConfig) -> Result<()>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &Key, value: &Value) -> Result<()>;

    /// Tear the layer down, releasing everything `initialize` acquired
    fn finalize(&self) -> Result<()>;
}
