//! FDFS Client - Blocking client for a FastDFS-style file cluster
//!
//! This crate provides:
//! - Tracker queries that pick a storage node for each operation
//! - Storage transfers (upload, download, delete) streamed over TCP
//! - Bounded per-address connection pools shared between threads
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 FdfsClient                   │
//! │  tracker pools (fixed)  storage pools (lazy) │
//! └──────────┬──────────────────────┬────────────┘
//!            │ 1. query             │ 2. transfer
//!            ▼                      ▼
//!      ┌──────────┐           ┌──────────┐
//!      │ tracker  │           │ storage  │
//!      └──────────┘           └──────────┘
//! ```
//!
//! All I/O is blocking; concurrency comes from the calling threads.

pub mod client;
pub mod conn_pool;
pub mod local_file;
pub mod storage;
pub mod tracker;

#[cfg(test)]
mod test_server;

pub use client::FdfsClient;
pub use conn_pool::{ConnPool, ConnPoolConfig, ConnPoolStatsSnapshot, PooledConn};
pub use local_file::LocalFile;
pub use tracker::TrackerQuery;

pub use fdfs_core::{Config, ConfigError, FdfsError, FileId, Result, StorageDescriptor};
