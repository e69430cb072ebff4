use serde::Serialize;
use std::fmt;

use crate::record::Level;

/// Severity understood by Cloud Logging.
///
/// Serialized in the upper-case form the `entries:write` API expects.
/// Ordering follows the service: `Default < Debug < ... < Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// Lowest severity the hook ever produces. Used for anything it cannot map.
    pub const LOWEST: Severity = Severity::Debug;

    /// Map a textual level name such as `"warn"` or `"FATAL"`.
    ///
    /// Unknown names map to [`Severity::LOWEST`]; this never fails.
    pub fn from_level_name(name: &str) -> Severity {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" | "warning" => Severity::Warning,
            "error" => Severity::Error,
            "fatal" => Severity::Critical,
            "panic" => Severity::Alert,
            _ => Severity::LOWEST,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level mapping used by the hook:
///
/// | level | severity |
/// |---|---|
/// | Debug, Info, Error | same |
/// | Warn | Warning |
/// | Fatal | Critical |
/// | Panic | Alert |
/// | Trace | Debug |
impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Debug => Severity::Debug,
            Level::Info => Severity::Info,
            Level::Warn => Severity::Warning,
            Level::Error => Severity::Error,
            Level::Fatal => Severity::Critical,
            Level::Panic => Severity::Alert,
            Level::Trace => Severity::LOWEST,
        }
    }
}
