//! Forward `tracing` events to Google Cloud Logging (Stackdriver).
//!
//! A [`hook::Hook`] maps each record's level to a Cloud Logging
//! [`severity::Severity`], promotes selected fields to entry labels and
//! hands the entry to a [`client::RemoteLogger`], buffered or
//! synchronously. [`layer::StackdriverLayer`] plugs the hook into a
//! `tracing_subscriber` registry.

pub mod client;
pub mod entry;
pub mod env;
pub mod error;
pub mod hook;
pub mod layer;
pub mod record;
pub mod severity;

#[cfg(feature = "http")]
pub mod http;

pub mod init;
pub mod memory;
pub mod stackdriver;
pub mod transport;

pub use client::{LoggerOptions, LoggingClient, RemoteLogger, SyncContext};
pub use error::LoggingError;
pub use hook::Hook;
pub use layer::StackdriverLayer;
