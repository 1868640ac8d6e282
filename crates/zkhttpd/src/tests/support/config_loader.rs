//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};

use zkhttp_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader producing a configuration that listens on an ephemeral local port.
#[derive(Debug, Default)]
pub struct TestConfigLoader;

impl TestConfigLoader {
    /// Configuration returned by this loader.
    #[must_use]
    pub fn config() -> Config {
        Config {
            listen: "127.0.0.1:0".to_owned(),
            ensemble: "127.0.0.1:2181".to_owned(),
            prefix: "/services".to_owned(),
            log_filter: "warn".to_owned(),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Self::config())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
#[derive(Debug, Default)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("zkhttpd"),
            OsString::from("--session-timeout-secs"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}
