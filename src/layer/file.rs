//! File backend
//!
//! Persists every `set` as a checksummed record appended to
//! `{path}/kvsal.log`, and rebuilds the key index by replaying the log on
//! initialize.
//!
//! ## Options (`[kvsal]` section)
//! - `path`: data directory (default `/var/lib/kvsal`)
//! - `sync`: `always` to fsync after every set, `fini` to fsync only at
//!   finalize (default `always`)

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;

use crate::bounded::{Key, Value};
use crate::config::{KvsalConfig, KVSAL_SECTION};
use crate::error::{KvsalError, Result};

use super::record::{Decoded, Record};
use super::KvLayer;

/// Data directory used when the config names none
pub const DEFAULT_DATA_DIR: &str = "/var/lib/kvsal";

/// Name of the record log inside the data directory
pub const LOG_FILENAME: &str = "kvsal.log";

/// When the record log is flushed to stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// fsync after every set (safest, slowest)
    #[default]
    Always,

    /// fsync once, at finalize
    OnFinalize,
}

impl FromStr for SyncPolicy {
    type Err = KvsalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(SyncPolicy::Always),
            "fini" | "finalize" => Ok(SyncPolicy::OnFinalize),
            other => Err(KvsalError::Config(format!(
                "unknown sync policy '{}' (expected always or fini)",
                other
            ))),
        }
    }
}

/// KV layer persisted to an append-only record log
#[derive(Default)]
pub struct FileLayer {
    /// `Some` between initialize and finalize
    state: Mutex<Option<FileState>>,
}

struct FileState {
    log_path: PathBuf,

    /// Log opened for appending
    file: File,

    sync: SyncPolicy,

    next_lsn: u64,

    /// Latest value of every key in the log
    index: BTreeMap<String, String>,
}

/// Result of replaying a record log
#[derive(Debug, Default)]
pub struct Replay {
    /// Latest value per key
    pub index: BTreeMap<String, String>,

    /// Number of complete records read
    pub records: u64,

    /// Highest LSN seen (0 for an empty log)
    pub last_lsn: u64,

    /// Length of the valid prefix of the log
    pub valid_len: u64,

    /// Whether a partially written record was found at the end
    pub torn_tail: bool,
}

impl FileLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key (layer must be initialized)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.state.lock();
        let state = state.as_ref().ok_or(KvsalError::NotInitialized)?;
        Ok(state.index.get(key).cloned())
    }

    /// Number of distinct keys (layer must be initialized)
    pub fn len(&self) -> Result<usize> {
        let state = self.state.lock();
        let state = state.as_ref().ok_or(KvsalError::NotInitialized)?;
        Ok(state.index.len())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Read every record of the log at `path` without modifying it
    ///
    /// A missing file replays as empty.
    pub fn replay(path: &Path) -> Result<Replay> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };

        let mut replay = Replay::default();
        let mut offset = 0usize;

        while offset < bytes.len() {
            match Record::decode(&bytes[offset..])? {
                Decoded::Record(record, used) => {
                    if record.lsn <= replay.last_lsn {
                        return Err(KvsalError::Corruption(format!(
                            "LSN {} after {} at offset {}",
                            record.lsn, replay.last_lsn, offset
                        )));
                    }
                    replay.last_lsn = record.lsn;
                    replay.records += 1;
                    replay.index.insert(record.key, record.value);
                    offset += used;
                }
                Decoded::Partial => {
                    replay.torn_tail = true;
                    break;
                }
            }
        }

        replay.valid_len = offset as u64;
        Ok(replay)
    }

    fn open_state(config: &KvsalConfig) -> Result<FileState> {
        let dir = PathBuf::from(
            config
                .get(KVSAL_SECTION, "path")
                .unwrap_or(DEFAULT_DATA_DIR),
        );
        let sync = match config.get(KVSAL_SECTION, "sync") {
            Some(s) => s.parse()?,
            None => SyncPolicy::default(),
        };

        fs::create_dir_all(&dir)?;
        let log_path = dir.join(LOG_FILENAME);

        let replay = Self::replay(&log_path)?;
        if replay.torn_tail {
            tracing::warn!(
                "Dropping partial record at end of {} (valid prefix {} bytes)",
                log_path.display(),
                replay.valid_len
            );
            let file = OpenOptions::new().write(true).open(&log_path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        tracing::debug!(
            "File layer opened {}: {} records, {} keys, last_lsn={}",
            log_path.display(),
            replay.records,
            replay.index.len(),
            replay.last_lsn
        );

        Ok(FileState {
            log_path,
            file,
            sync,
            next_lsn: replay.last_lsn + 1,
            index: replay.index,
        })
    }
}

impl KvLayer for FileLayer {
    fn initialize(&self, config: &KvsalConfig) -> Result<()> {
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(KvsalError::AlreadyInitialized);
        }

        *state = Some(Self::open_state(config)?);
        Ok(())
    }

    fn set(&self, key: &Key, value: &Value) -> Result<()> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(KvsalError::NotInitialized)?;

        let record = Record::new(state.next_lsn, key.as_str(), value.as_str());
        let frame = record.encode()?;

        append_frame(&mut state.file, &frame, state.sync == SyncPolicy::Always)?;

        state.next_lsn += 1;
        state.index.insert(record.key, record.value);

        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        let state = self.state.lock().take().ok_or(KvsalError::NotInitialized)?;

        state.file.sync_all()?;
        tracing::debug!(
            "File layer closed {} at lsn {}",
            state.log_path.display(),
            state.next_lsn - 1
        );

        Ok(())
    }
}

/// Append target of the record log
trait LogFile: Write {
    fn current_len(&self) -> io::Result<u64>;

    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Append one frame, optionally syncing it
///
/// On failure the log is cut back to its previous length so the next append
/// does not land behind a torn frame.
fn append_frame<F: LogFile>(file: &mut F, frame: &[u8], sync: bool) -> Result<()> {
    let start = file.current_len()?;

    let written = file
        .write_all(frame)
        .and_then(|()| if sync { file.sync() } else { Ok(()) });

    if let Err(e) = written {
        if let Err(undo) = file.truncate_to(start) {
            tracing::warn!("Failed to drop partial record at offset {}: {}", start, undo);
        }
        return Err(e.into());
    }

    Ok(())
}
