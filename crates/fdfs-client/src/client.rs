//! FDFS client - tracker lookup followed by a storage transfer
//!
//! Every public operation runs the same two hops in order:
//!
//! 1. Borrow a tracker connection (first tracker that yields one), ask for a
//!    storage node, release the tracker connection.
//! 2. Get or create the pool for that storage node, borrow a connection,
//!    run the transfer, release the connection.
//!
//! Connections are only released after a complete exchange. Any error
//! drops the borrowed connection, which closes it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use fdfs_core::{Config, FdfsError, FileId, Result, StorageDescriptor};

use crate::conn_pool::{ConnPool, ConnPoolConfig, PooledConn};
use crate::local_file::{truncate_ext, LocalFile};
use crate::storage;
use crate::tracker::{self, TrackerQuery};

/// Client for a tracker/storage cluster.
///
/// Safe to share between threads; each call borrows its own connections.
pub struct FdfsClient {
    config: Config,
    pool_config: ConnPoolConfig,
    /// One pool per distinct tracker, fixed at construction
    tracker_pools: Vec<Arc<ConnPool>>,
    /// Storage pools by `ip:port`, created on first use
    storage_pools: RwLock<HashMap<String, Arc<ConnPool>>>,
    closed: AtomicBool,
}

impl FdfsClient {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool_config = ConnPoolConfig::new(config.max_conns, &config.network);

        let mut tracker_pools: Vec<Arc<ConnPool>> = Vec::new();
        for addr in &config.tracker_servers {
            if tracker_pools.iter().any(|pool| pool.addr() == addr) {
                warn!("Tracker {} listed more than once", addr);
                continue;
            }
            tracker_pools.push(ConnPool::new(addr.as_str(), pool_config.clone()));
        }

        info!(
            "FDFS client ready: {} tracker(s), {} connections per pool",
            tracker_pools.len(),
            config.max_conns
        );
        Ok(Self {
            config,
            pool_config,
            tracker_pools,
            storage_pools: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Build a client from a TOML or `client.conf` style file
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Config::load_from(path.as_ref())?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Upload a local file; its extension (up to 6 bytes) is kept.
    pub fn upload_by_filename(&self, path: impl AsRef<Path>) -> Result<FileId> {
        let file = LocalFile::open(path)?;
        let size = file.size();
        let ext_name = file.ext_name().to_string();
        debug!("Uploading {:?} ({} bytes)", file.path(), size);
        self.upload_from(file, size, &ext_name)
    }

    /// Upload an in-memory buffer under the given extension
    pub fn upload_by_buffer(&self, data: &[u8], ext_name: &str) -> Result<FileId> {
        if data.is_empty() {
            return Err(FdfsError::EmptyBuffer);
        }
        self.upload_from(data, data.len() as u64, &truncate_ext(ext_name))
    }

    /// Download a whole file into `local_path`, creating or truncating it.
    ///
    /// A failed download can leave a partial file behind.
    pub fn download_to_file(&self, file_id: &str, local_path: impl AsRef<Path>) -> Result<()> {
        self.download_range_to_file(file_id, local_path, 0, 0)
            .map(|_| ())
    }

    /// Download `length` bytes from `offset` (0 = to the end) into `local_path`.
    pub fn download_range_to_file(
        &self,
        file_id: &str,
        local_path: impl AsRef<Path>,
        offset: u64,
        length: u64,
    ) -> Result<u64> {
        let file_id: FileId = file_id.parse()?;
        let storage = self.query_tracker(TrackerQuery::Fetch(&file_id))?;

        let mut out = BufWriter::new(File::create(local_path.as_ref())?);
        let received = self.with_storage_conn(&storage, |conn| {
            storage::download(conn, &file_id, offset, length, &mut out)
        })?;
        out.flush()?;

        info!("Downloaded {} ({} bytes) to {:?}", file_id, received, local_path.as_ref());
        Ok(received)
    }

    /// Download a whole file into memory
    pub fn download_to_buffer(&self, file_id: &str) -> Result<Vec<u8>> {
        let file_id: FileId = file_id.parse()?;
        let storage = self.query_tracker(TrackerQuery::Fetch(&file_id))?;

        let mut data = Vec::new();
        self.with_storage_conn(&storage, |conn| {
            storage::download(conn, &file_id, 0, 0, &mut data)
        })?;
        Ok(data)
    }

    pub fn delete_file(&self, file_id: &str) -> Result<()> {
        let file_id: FileId = file_id.parse()?;
        let storage = self.query_tracker(TrackerQuery::Update(&file_id))?;
        self.with_storage_conn(&storage, |conn| storage::delete(conn, &file_id))?;
        info!("Deleted {}", file_id);
        Ok(())
    }

    /// Close every tracker and storage pool.
    ///
    /// Idempotent; later operations fail with `ClientClosed`. Also runs on drop.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for pool in &self.tracker_pools {
            pool.destroy();
        }
        let storage_pools: Vec<_> = self
            .storage_pools
            .write()
            .drain()
            .map(|(_, pool)| pool)
            .collect();
        for pool in &storage_pools {
            pool.destroy();
        }
        info!(
            "FDFS client shut down ({} tracker, {} storage pools closed)",
            self.tracker_pools.len(),
            storage_pools.len()
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn tracker_addrs(&self) -> Vec<&str> {
        self.tracker_pools.iter().map(|pool| pool.addr()).collect()
    }

    /// Number of storage nodes this client has pools for
    pub fn storage_pool_count(&self) -> usize {
        self.storage_pools.read().len()
    }

    /// Shared upload path; `source` is dropped exactly once whatever happens.
    fn upload_from<R: Read>(&self, mut source: R, size: u64, ext_name: &str) -> Result<FileId> {
        let storage = self.query_tracker(TrackerQuery::Store)?;
        let file_id = self.with_storage_conn(&storage, |conn| {
            storage::upload(conn, storage.store_path_index, size, ext_name, &mut source)
        })?;
        info!("Uploaded {} bytes as {}", size, file_id);
        Ok(file_id)
    }

    /// First hop: the tracker connection is released before this returns.
    fn query_tracker(&self, query: TrackerQuery<'_>) -> Result<StorageDescriptor> {
        let mut conn = self.tracker_conn()?;
        let storage = tracker::query_storage(&mut conn, query)?;
        conn.release();
        Ok(storage)
    }

    /// First tracker, in configuration order, that yields a connection
    fn tracker_conn(&self) -> Result<PooledConn> {
        if self.is_closed() {
            return Err(FdfsError::ClientClosed);
        }
        for pool in &self.tracker_pools {
            match pool.acquire() {
                Ok(conn) => return Ok(conn),
                Err(e) if e.is_acquire_failure() => {
                    warn!("Tracker {} unavailable: {}", pool.addr(), e)
                }
                Err(e) => return Err(e),
            }
        }
        Err(FdfsError::NoTrackerAvailable {
            tried: self.tracker_pools.len(),
        })
    }

    /// Second hop: run `task` over a connection to the chosen storage node
    fn with_storage_conn<T, F>(&self, storage: &StorageDescriptor, task: F) -> Result<T>
    where
        F: FnOnce(&mut PooledConn) -> Result<T>,
    {
        let pool = self.storage_pool(&storage.addr)?;
        let mut conn = pool.acquire()?;
        let out = task(&mut conn)?;
        conn.release();
        Ok(out)
    }

    /// Get or create the pool for a storage address.
    ///
    /// Creation happens under the write lock, so concurrent first use of an
    /// address creates exactly one pool.
    fn storage_pool(&self, addr: &str) -> Result<Arc<ConnPool>> {
        if let Some(pool) = self.storage_pools.read().get(addr) {
            return Ok(Arc::clone(pool));
        }

        let mut pools = self.storage_pools.write();
        if self.is_closed() {
            return Err(FdfsError::ClientClosed);
        }
        let pool = pools.entry(addr.to_string()).or_insert_with(|| {
            debug!("Creating storage pool for {}", addr);
            ConnPool::new(addr, self.pool_config.clone())
        });
        Ok(Arc::clone(pool))
    }
}

impl Drop for FdfsClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
