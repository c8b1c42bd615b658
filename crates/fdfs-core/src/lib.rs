//! FDFS Core - Wire protocol, shared types and configuration
//!
//! This crate contains the pieces shared by every tracker and storage exchange:
//! the 10-byte frame header codec, the fixed-width body layouts, the error type
//! and the client configuration. It performs no networking of its own.

pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{Config, ConfigError, NetworkConfig};
pub use error::*;
pub use protocol::Header;
pub use types::*;

/// Default tracker port
pub const DEFAULT_TRACKER_PORT: u16 = 22122;

/// Default maximum connections per pool
pub const DEFAULT_MAX_CONNS: usize = 10;
