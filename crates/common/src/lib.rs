//! Common utilities for rust-usb-topology
//!
//! This crate provides the shared ambient pieces of the workspace: logging
//! setup, the catch-all error type used outside the typed topology errors,
//! and test utilities (most notably a scripted mock of the native USB
//! backend) shared by every crate's test suites.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
