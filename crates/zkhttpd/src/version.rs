//! Build metadata and the `--version` flag.
//!
//! `-V` prints the crate version. `--version` adds the build date, the git
//! revision and the compiler that produced the binary. Either flag is only
//! honoured as the first argument; everything else is left to the layered
//! configuration parser.

use std::ffi::OsString;
use std::io::{self, Write};

use clap::Parser;
use clap::error::ErrorKind;

/// Multi-line version report printed by `--version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nBuild Date: ",
    env!("ZKHTTPD_BUILD_DATE"),
    "\nBuild Git Revision: ",
    env!("ZKHTTPD_GIT_REVISION"),
    "\nBuild Compiler: ",
    env!("ZKHTTPD_RUSTC_VERSION"),
);

#[derive(Parser, Debug)]
#[command(
    name = "zkhttpd",
    version,
    long_version = LONG_VERSION,
    disable_help_flag = true
)]
struct VersionCli {
    /// Daemon arguments, parsed later by the configuration loader.
    #[arg(
        value_name = "ARG",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    arguments: Vec<OsString>,
}

/// Returns the version report when the first argument asks for one.
///
/// `args` includes the program name, as `std::env::args_os` yields it.
#[must_use]
pub fn requested_version<I, T>(args: I) -> Option<String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match VersionCli::try_parse_from(args) {
        Err(error) if error.kind() == ErrorKind::DisplayVersion => Some(error.render().to_string()),
        _ => None,
    }
}

/// Writes the version report to `out` when the first argument asks for one.
///
/// Returns whether a report was written, in which case the daemon should not
/// start.
///
/// # Errors
///
/// Returns the IO error raised while writing the report.
pub fn write_requested_version<I, T, W>(args: I, out: &mut W) -> io::Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
{
    let Some(report) = requested_version(args) else {
        return Ok(false);
    };
    out.write_all(report.as_bytes())?;
    out.flush()?;
    Ok(true)
}
