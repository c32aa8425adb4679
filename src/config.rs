//! Configuration for kvsal
//!
//! The driver loads an INI file from a fixed path and hands it to the KV layer
//! untouched. Only the layer backends look inside; the driver never does.

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::{KvsalError, Result};

/// Default configuration file, fixed at build time.
///
/// Set `KVSNS_CONFIG` in the build environment to bake in another path.
pub const DEFAULT_CONFIG_PATH: &str = match option_env!("KVSNS_CONFIG") {
    Some(path) => path,
    None => "/etc/kvsns.d/kvsns.ini",
};

/// Section holding the options of the bundled KV layer backends
pub const KVSAL_SECTION: &str = "kvsal";

/// Parsed configuration, forwarded as-is to `KvLayer::initialize`
#[derive(Debug, Clone)]
pub struct KvsalConfig {
    /// File the configuration was read from (`None` when built in memory)
    source: Option<PathBuf>,

    /// Raw INI contents
    ini: Ini,
}

impl KvsalConfig {
    /// Load and parse an INI file
    ///
    /// A missing or unreadable file is a `ConfigRead` error carrying the OS
    /// errno; a syntax error is a `ConfigParse` error. The first syntax error
    /// stops the parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => KvsalError::ConfigRead {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => KvsalError::ConfigParse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            },
        })?;

        tracing::debug!("Loaded config from {}", path.display());

        Ok(Self {
            source: Some(path.to_path_buf()),
            ini,
        })
    }

    /// Parse configuration text that did not come from a file
    pub fn parse(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text).map_err(|e| KvsalError::ConfigParse {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })?;

        Ok(Self { source: None, ini })
    }

    /// Create a new config builder
    pub fn builder() -> KvsalConfigBuilder {
        KvsalConfigBuilder::default()
    }

    /// Look up `key` in `section`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.ini.section(Some(section)).and_then(|props| props.get(key))
    }

    /// Names of all named sections, in file order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.ini.sections().flatten()
    }

    /// The file this configuration was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for KvsalConfig {
    fn default() -> Self {
        Self {
            source: None,
            ini: Ini::new(),
        }
    }
}

/// Builder for KvsalConfig
#[derive(Default)]
pub struct KvsalConfigBuilder {
    config: KvsalConfig,
}

impl KvsalConfigBuilder {
    /// Set `key = value` in `section`
    pub fn set(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.config
            .ini
            .with_section(Some(section))
            .set(key, value.into());
        self
    }

    /// Set an option of the `[kvsal]` section
    pub fn kvsal(self, key: &str, value: impl Into<String>) -> Self {
        self.set(KVSAL_SECTION, key, value)
    }

    /// Record the file this configuration stands for
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source = Some(path.into());
        self
    }

    pub fn build(self) -> KvsalConfig {
        self.config
    }
}
