//! Command-line surface of the driver
//!
//! Exactly two positional arguments and no flags: every argument, `--` and
//! anything starting with `-` included, is taken verbatim as the key or the
//! value. The configuration path is fixed when the binary is built.

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

/// Arguments expected after the program name
const ARG_COUNT: usize = 2;

/// kvsal-set
#[derive(Parser, Debug)]
#[command(name = "kvsal-set")]
#[command(about = "Set one key through the kvsal layer (non-regression driver)")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Args {
    /// The key to set
    pub key: OsString,

    /// The value to set
    pub value: OsString,
}

impl Args {
    /// Parse a full argument list, program name first
    ///
    /// The count is checked on the raw list; clap then only sees the
    /// arguments behind a `--`, so none of them is read as an option or as
    /// the separator.
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut argv: Vec<OsString> = args.into_iter().map(Into::into).collect();

        let given = argv.len().saturating_sub(1);
        if given != ARG_COUNT {
            return Err(Self::command().error(
                ErrorKind::WrongNumberOfValues,
                format!(
                    "expected exactly {} arguments <KEY> <VALUE>, got {}",
                    ARG_COUNT, given
                ),
            ));
        }

        argv.insert(1, OsString::from("--"));
        Self::try_parse_from(argv)
    }
}
