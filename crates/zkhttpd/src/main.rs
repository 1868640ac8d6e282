//! Daemon entrypoint for the ZooKeeper JSON-over-HTTP gateway.
//!
//! `--version` and `-V` are answered before any configuration is loaded.
//! Every other command line is handed to [`zkhttpd::run_daemon`].

use std::io::{self, StdoutLock, Write};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    match zkhttpd::write_requested_version(std::env::args_os(), &mut stdout) {
        Ok(true) => return ExitCode::SUCCESS,
        Ok(false) => {}
        Err(_) => return ExitCode::FAILURE,
    }
    drop(stdout);

    match zkhttpd::run_daemon().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "zkhttpd", %error, "daemon exited with an error");
            if let Err(write_error) = writeln!(io::stderr(), "zkhttpd: {error}") {
                tracing::warn!(target: "zkhttpd", %write_error, "could not report the failure on stderr");
            }
            ExitCode::FAILURE
        }
    }
}
