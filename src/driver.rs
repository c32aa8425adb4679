//! Driver Module
//!
//! Runs one non-regression pass against a KV layer: load the config,
//! initialize the layer, set one key, finalize, report.
//!
//! ## State Chain
//! ```text
//!   ConfigLoading ──► Initializing ──► Writing ──► Finalizing ──► Done
//!         │                │              │             │
//!         └────────────────┴──────┬───────┴─────────────┘
//!                                 ▼
//!                            Exit(error)
//! ```
//! The first failing step ends the run; nothing is retried.

use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bounded::{Key, Value};
use crate::cli::Args;
use crate::config::{KvsalConfig, DEFAULT_CONFIG_PATH};
use crate::error::KvsalError;
use crate::layer::{KvLayer, Session};

/// Printed on stdout after a successful run
pub const SUCCESS_MARKER: &str = "+++++++++++++++";

/// Exit status for a wrong argument count
pub const USAGE_EXIT_CODE: i32 = 1;

/// Steps of a driver run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Key and value length checks, before anything is acquired
    Validating,
    ConfigLoading,
    Initializing,
    Writing,
    Finalizing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Validating => "invalid argument",
            Step::ConfigLoading => "Can't read config",
            Step::Initializing => "kvsal_init",
            Step::Writing => "kvsal_set_char",
            Step::Finalizing => "kvsal_fini",
        };
        f.write_str(name)
    }
}

/// What happens to an initialized layer when the write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    /// Finalize the layer on every exit path after initialize
    #[default]
    Always,

    /// Finalize only after a successful write; a failed write exits with
    /// the layer still up
    OnSuccess,
}

/// A failed driver step
#[derive(Debug, Error)]
#[error("{step}: err={code} ({source})", code = .source.code())]
pub struct DriverError {
    pub step: Step,

    #[source]
    pub source: KvsalError,
}

impl DriverError {
    pub fn new(step: Step, source: KvsalError) -> Self {
        Self { step, source }
    }

    /// Process exit status for this failure
    ///
    /// The magnitude of the layer's status code. Codes that would read as
    /// success or overflow an exit status become 1.
    pub fn exit_code(&self) -> i32 {
        match self.source.code().unsigned_abs() {
            code @ 1..=255 => code as i32,
            _ => 1,
        }
    }
}

/// The non-regression driver
#[derive(Debug, Clone)]
pub struct Driver {
    config_path: PathBuf,
    teardown: Teardown,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            teardown: Teardown::default(),
        }
    }
}

impl Driver {
    /// Create a new driver builder
    pub fn builder() -> DriverBuilder {
        DriverBuilder::default()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn teardown(&self) -> Teardown {
        self.teardown
    }

    /// Run the four steps against `layer`
    pub fn run<L: KvLayer + ?Sized>(
        &self,
        layer: &L,
        key: &Key,
        value: &Value,
    ) -> Result<(), DriverError> {
        // Step 1: Load configuration (no layer state yet)
        let config = KvsalConfig::load(&self.config_path)
            .map_err(|e| DriverError::new(Step::ConfigLoading, e))?;

        // Step 2: Initialize the layer
        let session =
            Session::open(layer, &config).map_err(|e| DriverError::new(Step::Initializing, e))?;
        tracing::debug!("KV layer initialized");

        // Step 3: Write
        if let Err(e) = session.set(key, value) {
            if self.teardown == Teardown::OnSuccess {
                session.abandon();
            }
            // Otherwise dropping the session finalizes the layer
            return Err(DriverError::new(Step::Writing, e));
        }
        tracing::debug!("Set {}={}", key, value);

        // Step 4: Finalize
        session
            .finalize()
            .map_err(|e| DriverError::new(Step::Finalizing, e))?;
        tracing::debug!("KV layer finalized");

        Ok(())
    }

    /// Whole-process behavior: parse `args` (program name first), run, and
    /// report on `out`/`err`
    ///
    /// Returns the process exit status.
    pub fn main<L, I, T, O, E>(&self, args: I, layer: &L, out: &mut O, err: &mut E) -> i32
    where
        L: KvLayer + ?Sized,
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        O: Write,
        E: Write,
    {
        let args = match Args::parse_from_args(args) {
            Ok(args) => args,
            Err(e) => {
                let _ = write!(err, "{}", e.render());
                return USAGE_EXIT_CODE;
            }
        };

        let result = validate(args).and_then(|(key, value)| self.run(layer, &key, &value));

        match result {
            Ok(()) => {
                let _ = writeln!(out, "{}", SUCCESS_MARKER);
                let _ = out.flush();
                0
            }
            Err(e) => {
                tracing::debug!(step = ?e.step, code = e.source.code(), "Driver run failed");
                let _ = writeln!(err, "{}", e);
                e.exit_code()
            }
        }
    }
}

/// Check both arguments against the layer's text and length limits
fn validate(args: Args) -> Result<(Key, Value), DriverError> {
    let key = utf8("key", args.key)
        .and_then(|s| Key::new("key", s))
        .map_err(|e| DriverError::new(Step::Validating, e))?;
    let value = utf8("value", args.value)
        .and_then(|s| Value::new("value", s))
        .map_err(|e| DriverError::new(Step::Validating, e))?;
    Ok((key, value))
}

fn utf8(what: &'static str, arg: OsString) -> crate::error::Result<String> {
    arg.into_string()
        .map_err(|_| KvsalError::InvalidUtf8 { what })
}

/// Builder for Driver
#[derive(Default)]
pub struct DriverBuilder {
    driver: Driver,
}

impl DriverBuilder {
    /// Read the configuration from `path` instead of the built-in default
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.driver.config_path = path.into();
        self
    }

    /// Set the teardown policy for a failed write
    pub fn teardown(mut self, teardown: Teardown) -> Self {
        self.driver.teardown = teardown;
        self
    }

    pub fn build(self) -> Driver {
        self.driver
    }
}
