//! Error types for the FDFS client

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Every failure surfaced by the client
#[derive(Error, Debug)]
pub enum FdfsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection pool for {addr} exhausted ({capacity} connections in use)")]
    PoolExhausted { addr: String, capacity: usize },

    #[error("failed to connect to {addr}: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("connection pool for {0} is closed")]
    PoolClosed(String),

    #[error("client has been shut down")]
    ClientClosed,

    #[error("no tracker available ({tried} tried)")]
    NoTrackerAvailable { tried: usize },

    #[error("remote returned status {0}")]
    RemoteStatus(u8),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid file id: {0:?}")]
    InvalidFileId(String),

    #[error("file {0:?} is empty")]
    EmptyFile(PathBuf),

    #[error("{0:?} is not a regular file")]
    NotAFile(PathBuf),

    #[error("upload buffer is empty")]
    EmptyBuffer,
}

impl FdfsError {
    /// Whether trying another tracker could get past this error.
    ///
    /// Only connection acquisition failures qualify; a tracker that answered
    /// with a status or a bad body is not retried elsewhere.
    pub fn is_acquire_failure(&self) -> bool {
        matches!(
            self,
            FdfsError::PoolExhausted { .. } | FdfsError::DialFailed { .. } | FdfsError::PoolClosed(_)
        )
    }

    /// Remote status code, if this is a status error
    pub fn remote_status(&self) -> Option<u8> {
        match self {
            FdfsError::RemoteStatus(status) => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FdfsError>;
