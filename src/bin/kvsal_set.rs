//! kvsal-set
//!
//! Sets one key through the kvsal layer configured in the kvsns INI file.
//! Prints the success marker on stdout; everything else goes to stderr.

use std::io::{self, Write};

use kvsal::{Backend, Driver};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    // Initialize tracing/logging (stderr only; stdout carries the marker)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let driver = Driver::default();
    tracing::debug!(
        "kvsal-set v{}, config {}",
        kvsal::VERSION,
        driver.config_path().display()
    );

    let layer = Backend::new();
    let code = {
        let mut out = io::stdout().lock();
        let mut err = io::stderr().lock();
        let code = driver.main(std::env::args_os(), &layer, &mut out, &mut err);
        let _ = out.flush();
        let _ = err.flush();
        code
    };

    std::process::exit(code);
}
