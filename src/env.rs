//! Environment variable names used by this crate for convenient
//! configuration of the HTTP client from services.
//!
//! These are purely helpers; the hook itself never reads the environment.

/// Google Cloud project that owns the logs.
pub const STACKDRIVER_PROJECT_ID_ENV: &str = "STACKDRIVER_PROJECT_ID";

/// Log id used by [`crate::init::init_from_env`]; `app` when unset.
pub const STACKDRIVER_LOG_ID_ENV: &str = "STACKDRIVER_LOG_ID";

/// Override for the `entries:write` URL, e.g. a local emulator.
pub const STACKDRIVER_ENDPOINT_ENV: &str = "STACKDRIVER_ENDPOINT";

/// Optional OAuth2 bearer token.
pub const STACKDRIVER_ACCESS_TOKEN_ENV: &str = "STACKDRIVER_ACCESS_TOKEN";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
