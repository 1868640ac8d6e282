//! Output formats for the daemon's diagnostic log on stderr.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log records are rendered on stderr.
///
/// Parsed case-insensitively from `--log-format`, `ZKHTTP_LOG_FORMAT` or the
/// `log_format` key of the configuration file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One flattened JSON object per event, for log shippers.
    #[default]
    Json,
    /// Terse single-line text for operators tailing the daemon.
    Compact,
    /// Verbose text carrying every span field of the event.
    Full,
}

impl LogFormat {
    /// Whether records are meant for people rather than log pipelines.
    ///
    /// Terminal colouring is only ever enabled for these formats.
    #[must_use]
    pub const fn is_human_readable(self) -> bool {
        !matches!(self, Self::Json)
    }
}

/// Error returned when a log format name is not recognised.
pub type LogFormatParseError = strum::ParseError;
