//! Tests for Driver
//!
//! These tests verify:
//! - The exact call sequence seen by the KV layer
//! - Exit codes and stderr/stdout reporting per failing step
//! - Argument count and length checks happen before any work
//! - Teardown policy on a failed write
//! - Runs against the bundled backends

use std::fs;
use std::path::{Path, PathBuf};

use kvsal::layer::FileLayer;
use kvsal::{
    Backend, Driver, KvLayer, KvsalConfig, KvsalError, Key, Result, Step, Teardown, Value,
    MAX_KEY_LEN, MAX_VALUE_LEN, SUCCESS_MARKER,
};
use parking_lot::Mutex;
use tempfile::TempDir;

// =============================================================================
// Recording Layer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Initialize(Option<PathBuf>),
    Set(String, String),
    Finalize,
}

/// KV layer double that logs every call and fails on demand
#[derive(Default)]
struct RecordingLayer {
    calls: Mutex<Vec<Call>>,
    fail_initialize: Option<i32>,
    fail_set: Option<i32>,
    fail_finalize: Option<i32>,
}

impl RecordingLayer {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

fn status(code: Option<i32>) -> Result<()> {
    match code {
        Some(code) => Err(KvsalError::Status(code)),
        None => Ok(()),
    }
}

impl KvLayer for RecordingLayer {
    fn initialize(&self, config: &KvsalConfig) -> Result<()> {
        self.calls
            .lock()
            .push(Call::Initialize(config.source().map(Path::to_path_buf)));
        status(self.fail_initialize)
    }

    fn set(&self, key: &Key, value: &Value) -> Result<()> {
        self.calls
            .lock()
            .push(Call::Set(key.to_string(), value.to_string()));
        status(self.fail_set)
    }

    fn finalize(&self) -> Result<()> {
        self.calls.lock().push(Call::Finalize);
        status(self.fail_finalize)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_config(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("kvsns.ini");
    fs::write(&path, contents).unwrap();
    (temp_dir, path)
}

fn driver_for(path: &Path) -> Driver {
    Driver::builder().config_path(path).build()
}

fn run_main<L: KvLayer>(driver: &Driver, args: &[&str], layer: &L) -> (i32, String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let code = driver.main(args.iter().copied(), layer, &mut out, &mut err);
    (
        code,
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

// =============================================================================
// Success Path Tests
// =============================================================================

#[test]
fn test_round_trip_call_sequence() {
    let (_temp, path) = setup_config("[kvsal]\nbackend = memory\n");
    let layer = RecordingLayer::default();

    let (code, out, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 0);
    assert_eq!(out, format!("{}\n", SUCCESS_MARKER));
    assert_eq!(out.matches(SUCCESS_MARKER).count(), 1);
    assert!(err.is_empty());
    assert_eq!(
        layer.calls(),
        vec![
            Call::Initialize(Some(path.clone())),
            Call::Set("foo".to_string(), "bar".to_string()),
            Call::Finalize,
        ]
    );
}

#[test]
fn test_empty_config_is_forwarded() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer::default();

    let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", "k", "v"], &layer);

    assert_eq!(code, 0);
    assert_eq!(layer.calls().len(), 3);
}

#[test]
fn test_hyphenated_arguments_are_values() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer::default();

    let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", "-k", "-v"], &layer);

    assert_eq!(code, 0);
    assert_eq!(
        layer.calls()[1],
        Call::Set("-k".to_string(), "-v".to_string())
    );
}

#[test]
fn test_double_dash_is_a_plain_argument() {
    let (_temp, path) = setup_config("");
    let driver = driver_for(&path);

    let cases: &[(&[&str], &str, &str)] = &[
        (&["kvsal-set", "--", "x"], "--", "x"),
        (&["kvsal-set", "a", "--"], "a", "--"),
        (&["kvsal-set", "--", "--"], "--", "--"),
    ];

    for (args, key, value) in cases {
        let layer = RecordingLayer::default();
        let (code, out, _) = run_main(&driver, args, &layer);

        assert_eq!(code, 0, "args {:?}", args);
        assert_eq!(out, format!("{}\n", SUCCESS_MARKER), "args {:?}", args);
        assert_eq!(
            layer.calls()[1],
            Call::Set(key.to_string(), value.to_string()),
            "args {:?}",
            args
        );
    }
}

#[test]
fn test_empty_key_and_value() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer::default();

    let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", "", ""], &layer);

    assert_eq!(code, 0);
    assert_eq!(layer.calls()[1], Call::Set(String::new(), String::new()));
}

// =============================================================================
// Usage Error Tests
// =============================================================================

#[test]
fn test_wrong_argument_count() {
    let temp_dir = TempDir::new().unwrap();
    // Never created: a config load would fail with ENOENT instead of 1
    let driver = driver_for(&temp_dir.path().join("missing.ini"));

    let cases: &[&[&str]] = &[
        &["kvsal-set"],
        &["kvsal-set", "foo"],
        &["kvsal-set", "foo", "bar", "baz"],
        &["kvsal-set", "--"],
        &["kvsal-set", "--", "a", "b"],
        &["kvsal-set", "a", "b", "--"],
    ];

    for args in cases {
        let layer = RecordingLayer::default();
        let (code, out, err) = run_main(&driver, args, &layer);

        assert_eq!(code, 1, "args {:?}", args);
        assert!(out.is_empty(), "args {:?}", args);
        assert!(!err.is_empty(), "args {:?}", args);
        assert!(layer.calls().is_empty(), "args {:?}", args);
    }
}

#[test]
fn test_key_too_long_rejected_before_any_work() {
    let temp_dir = TempDir::new().unwrap();
    let driver = driver_for(&temp_dir.path().join("missing.ini"));
    let layer = RecordingLayer::default();
    let key = "k".repeat(MAX_KEY_LEN + 1);

    let (code, out, err) = run_main(&driver, &["kvsal-set", &key, "bar"], &layer);

    assert_eq!(code, libc_einval());
    assert!(out.is_empty());
    assert!(err.contains("key too long"));
    assert!(layer.calls().is_empty());
}

#[test]
fn test_value_too_long_rejected_before_any_work() {
    let temp_dir = TempDir::new().unwrap();
    let driver = driver_for(&temp_dir.path().join("missing.ini"));
    let layer = RecordingLayer::default();
    let value = "v".repeat(MAX_VALUE_LEN + 1);

    let (code, _, err) = run_main(&driver, &["kvsal-set", "foo", &value], &layer);

    assert_eq!(code, libc_einval());
    assert!(err.contains("value too long"));
    assert!(layer.calls().is_empty());
}

#[test]
fn test_max_length_arguments_accepted() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer::default();
    let key = "k".repeat(MAX_KEY_LEN);
    let value = "v".repeat(MAX_VALUE_LEN);

    let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", &key, &value], &layer);

    assert_eq!(code, 0);
    assert_eq!(layer.calls()[1], Call::Set(key, value));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_argument_rejected_before_any_work() {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    let temp_dir = TempDir::new().unwrap();
    let driver = driver_for(&temp_dir.path().join("missing.ini"));

    let cases = [
        (OsString::from_vec(vec![0xff]), OsString::from("bar"), "key"),
        (OsString::from("foo"), OsString::from_vec(vec![b'v', 0xfe]), "value"),
    ];

    for (key, value, what) in cases {
        let layer = RecordingLayer::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let args = vec![OsString::from("kvsal-set"), key, value];

        let code = driver.main(args, &layer, &mut out, &mut err);
        let err = String::from_utf8(err).unwrap();

        assert_eq!(code, libc_einval(), "{}", what);
        assert!(out.is_empty(), "{}", what);
        assert!(err.contains(&format!("{} is not valid UTF-8", what)), "{}", err);
        assert!(layer.calls().is_empty(), "{}", what);
    }
}

fn libc_einval() -> i32 {
    KvsalError::Config(String::new()).code().abs()
}

// =============================================================================
// Step Failure Tests
// =============================================================================

#[test]
fn test_missing_config_never_initializes() {
    let temp_dir = TempDir::new().unwrap();
    let driver = driver_for(&temp_dir.path().join("missing.ini"));
    let layer = RecordingLayer::default();

    let (code, out, err) = run_main(&driver, &["kvsal-set", "foo", "bar"], &layer);

    // ENOENT
    assert_eq!(code, 2);
    assert!(out.is_empty());
    assert!(err.starts_with("Can't read config: err=-2"));
    assert!(layer.calls().is_empty());
}

#[test]
fn test_malformed_config_never_initializes() {
    // Section header never closed
    let (_temp, path) = setup_config("[kvsal");
    let layer = RecordingLayer::default();

    let (code, _, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, libc_einval());
    assert!(err.starts_with("Can't read config"));
    assert!(layer.calls().is_empty());
}

#[test]
fn test_initialize_failure_stops_run() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer {
        fail_initialize: Some(-5),
        ..Default::default()
    };

    let (code, out, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 5);
    assert!(out.is_empty());
    assert!(err.starts_with("kvsal_init: err=-5"));
    assert_eq!(layer.calls(), vec![Call::Initialize(Some(path.clone()))]);
}

#[test]
fn test_set_failure_finalizes_by_default() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer {
        fail_set: Some(-28),
        ..Default::default()
    };

    let (code, out, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 28);
    assert!(out.is_empty());
    assert!(err.starts_with("kvsal_set_char: err=-28"));
    assert_eq!(
        layer.calls(),
        vec![
            Call::Initialize(Some(path.clone())),
            Call::Set("foo".to_string(), "bar".to_string()),
            Call::Finalize,
        ]
    );
}

#[test]
fn test_set_failure_keeps_set_code_when_teardown_fails() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer {
        fail_set: Some(-28),
        fail_finalize: Some(-5),
        ..Default::default()
    };

    let (code, _, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 28);
    assert!(err.starts_with("kvsal_set_char"));
    assert_eq!(layer.calls().last(), Some(&Call::Finalize));
}

#[test]
fn test_set_failure_on_success_teardown_skips_finalize() {
    let (_temp, path) = setup_config("");
    let driver = Driver::builder()
        .config_path(&path)
        .teardown(Teardown::OnSuccess)
        .build();
    let layer = RecordingLayer {
        fail_set: Some(-28),
        ..Default::default()
    };

    let (code, _, _) = run_main(&driver, &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 28);
    assert_eq!(
        layer.calls(),
        vec![
            Call::Initialize(Some(path.clone())),
            Call::Set("foo".to_string(), "bar".to_string()),
        ]
    );
}

#[test]
fn test_finalize_failure() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer {
        fail_finalize: Some(-16),
        ..Default::default()
    };

    let (code, out, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 16);
    assert!(out.is_empty());
    assert!(err.starts_with("kvsal_fini: err=-16"));
    // Finalize is attempted exactly once
    assert_eq!(layer.calls().len(), 3);
}

#[test]
fn test_exit_code_out_of_range_becomes_one() {
    let (_temp, path) = setup_config("");

    for status in [-300, 0] {
        let layer = RecordingLayer {
            fail_set: Some(status),
            ..Default::default()
        };
        let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);
        assert_eq!(code, 1, "status {}", status);
    }
}

#[test]
fn test_run_reports_failing_step() {
    let (_temp, path) = setup_config("");
    let layer = RecordingLayer {
        fail_set: Some(-12),
        ..Default::default()
    };
    let key = Key::new("key", "foo").unwrap();
    let value = Value::new("value", "bar").unwrap();

    let err = driver_for(&path).run(&layer, &key, &value).unwrap_err();

    assert_eq!(err.step, Step::Writing);
    assert_eq!(err.source.code(), -12);
    assert_eq!(err.exit_code(), 12);
}

#[test]
fn test_default_driver() {
    let driver = Driver::default();

    assert_eq!(driver.config_path(), Path::new(kvsal::DEFAULT_CONFIG_PATH));
    assert_eq!(driver.teardown(), Teardown::Always);
}

// =============================================================================
// Bundled Backend Tests
// =============================================================================

#[test]
fn test_driver_with_memory_backend() {
    let (_temp, path) = setup_config("[kvsal]\nbackend = memory\n");
    let layer = Backend::new();

    let (code, out, _) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &layer);

    assert_eq!(code, 0);
    assert_eq!(out, format!("{}\n", SUCCESS_MARKER));
    // Finalized at the end of the run
    assert_eq!(layer.kind(), None);
}

#[test]
fn test_driver_with_file_backend_persists() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let path = temp_dir.path().join("kvsns.ini");
    fs::write(
        &path,
        format!("[kvsal]\nbackend = file\npath = {}\n", data_dir.display()),
    )
    .unwrap();

    let (code, _, _) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &Backend::new());
    assert_eq!(code, 0);

    let layer = FileLayer::new();
    layer.initialize(&KvsalConfig::load(&path).unwrap()).unwrap();
    assert_eq!(layer.get("foo").unwrap(), Some("bar".to_string()));
    layer.finalize().unwrap();
}

#[test]
fn test_driver_with_unknown_backend() {
    let (_temp, path) = setup_config("[kvsal]\nbackend = redis\n");

    let (code, _, err) = run_main(&driver_for(&path), &["kvsal-set", "foo", "bar"], &Backend::new());

    assert_eq!(code, libc_einval());
    assert!(err.starts_with("kvsal_init"));
}
