//! Common utilities and types shared across minidfs

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, TimeoutConfig};
pub use error::{Error, NodeAttempt, NodeFailure, Result};
pub use utils::{encode_segment, format_bytes, parse_duration, sanitize_file_id};
