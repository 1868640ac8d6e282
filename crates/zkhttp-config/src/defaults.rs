/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";

/// Default path of the command endpoint.
pub const DEFAULT_ENDPOINT: &str = "/zk";

/// Default ensemble address list.
pub const DEFAULT_ENSEMBLE: &str = "127.0.0.1:2181";

/// Default session timeout, in seconds.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned listen address used where allocation is required (e.g. serde).
#[must_use]
pub fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_owned()
}

/// Owned endpoint path.
#[must_use]
pub fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

/// Owned ensemble address list.
#[must_use]
pub fn default_ensemble() -> String {
    DEFAULT_ENSEMBLE.to_owned()
}

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
