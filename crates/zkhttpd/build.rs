//! Build script: stamp build metadata reported by `zkhttpd --version`.

use std::env;
use std::process::Command;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const UNKNOWN: &str = "unknown";

fn build_date() -> String {
    let stamp = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .map_or_else(OffsetDateTime::now_utc, |raw| source_date(&raw));
    stamp.format(&Rfc3339).unwrap_or_else(|_| UNKNOWN.into())
}

fn source_date(raw: &str) -> OffsetDateTime {
    raw.parse::<i64>()
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .unwrap_or_else(|| {
            println!(
                "cargo:warning=Invalid SOURCE_DATE_EPOCH '{raw}'; expected integer seconds since \
                 Unix epoch; using the current time"
            );
            OffsetDateTime::now_utc()
        })
}

/// Runs `program` with `args` and returns its first output line.
fn first_line(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()?
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
}

fn git_revision() -> String {
    env::var("ZKHTTPD_GIT_REVISION")
        .ok()
        .filter(|revision| !revision.is_empty())
        .or_else(|| first_line("git", &["rev-parse", "--short=12", "HEAD"]))
        .unwrap_or_else(|| UNKNOWN.into())
}

fn compiler_version() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".into());
    first_line(&rustc, &["--version"]).unwrap_or_else(|| UNKNOWN.into())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-env-changed=ZKHTTPD_GIT_REVISION");

    println!("cargo:rustc-env=ZKHTTPD_BUILD_DATE={}", build_date());
    println!("cargo:rustc-env=ZKHTTPD_GIT_REVISION={}", git_revision());
    println!("cargo:rustc-env=ZKHTTPD_RUSTC_VERSION={}", compiler_version());
}
