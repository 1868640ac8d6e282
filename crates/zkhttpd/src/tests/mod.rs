//! Crate-level test suites and their shared doubles.

mod http_api;
mod support;
