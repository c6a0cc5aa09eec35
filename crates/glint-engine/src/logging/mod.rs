//! Logger setup.
//!
//! Everything in the workspace logs through the `log` facade; this module
//! only installs the `env_logger` backend.

mod init;

pub use init::{LoggingConfig, init_logging};
