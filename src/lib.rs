//! # kvsal
//!
//! Non-regression driver for the kvsal key-value abstraction layer:
//! - Loads the kvsns INI configuration from a fixed path
//! - Initializes the KV layer, sets one key, finalizes
//! - Reports the first failing step through stderr and the exit status
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   kvsal-set <key> <value>                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Driver                                │
//! │   validate → load config → initialize → set → finalize       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  KvLayer (injectable)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Memory    │          │    File     │
//!   │  (RwLock)   │          │ (record log)│
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod bounded;
pub mod layer;
pub mod cli;
pub mod driver;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvsalError, Result};
pub use config::{KvsalConfig, DEFAULT_CONFIG_PATH};
pub use bounded::{BoundedString, Key, Value, MAX_KEY_LEN, MAX_VALUE_LEN};
pub use layer::{Backend, KvLayer, Session};
pub use driver::{Driver, DriverError, Step, Teardown, SUCCESS_MARKER};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvsal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
