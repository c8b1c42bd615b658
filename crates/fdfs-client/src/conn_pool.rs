//! Per-address TCP connection pool
//!
//! Lends reusable connections to one tracker or storage node.
//!
//! # Design
//! - Bounded: never more than `max_conns` live connections (idle + lent)
//! - Lazy: connections are dialed on demand, outside the pool lock
//! - No waiting: an exhausted pool fails the acquire immediately
//! - A lent connection goes back to the idle set only through
//!   [`PooledConn::release`]; dropping the guard closes it, so a
//!   connection abandoned mid-frame never reaches the idle set

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use fdfs_core::{FdfsError, NetworkConfig, Result, DEFAULT_MAX_CONNS};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct ConnPoolConfig {
    /// Maximum live connections
    pub max_conns: usize,
    /// Dial timeout (zero = OS default)
    pub connect_timeout: Duration,
    /// Read/write timeout applied to every dialed socket
    pub network_timeout: Option<Duration>,
}

impl ConnPoolConfig {
    pub fn new(max_conns: usize, network: &NetworkConfig) -> Self {
        Self {
            max_conns,
            connect_timeout: network.connect_timeout(),
            network_timeout: network.network_timeout(),
        }
    }
}

impl Default for ConnPoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNS, &NetworkConfig::default())
    }
}

/// Statistics for pool monitoring
#[derive(Debug, Default)]
struct ConnPoolStats {
    /// Total acquire operations
    acquires: AtomicU64,
    /// New connections dialed
    dials: AtomicU64,
    /// Acquires refused at capacity
    exhausted_events: AtomicU64,
    /// Connections closed instead of returned
    discarded: AtomicU64,
}

#[derive(Debug, Default)]
struct PoolState {
    /// Connections ready for reuse
    idle: Vec<TcpStream>,
    /// Idle plus lent connections
    live: usize,
    closed: bool,
}

/// Bounded pool of connections to one `host:port`
pub struct ConnPool {
    addr: String,
    config: ConnPoolConfig,
    state: Mutex<PoolState>,
    stats: ConnPoolStats,
}

impl ConnPool {
    /// Create an empty pool; nothing is dialed until the first acquire.
    pub fn new(addr: impl Into<String>, config: ConnPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.into(),
            config,
            state: Mutex::new(PoolState::default()),
            stats: ConnPoolStats::default(),
        })
    }

    /// Borrow a connection.
    ///
    /// Reuses an idle connection when one exists, otherwise dials a new one
    /// if the pool is below capacity.
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConn> {
        self.stats.acquires.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(FdfsError::PoolClosed(self.addr.clone()));
            }
            if let Some(stream) = state.idle.pop() {
                return Ok(self.lend(stream));
            }
            if state.live >= self.config.max_conns {
                self.stats.exhausted_events.fetch_add(1, Ordering::Relaxed);
                debug!("Pool {} exhausted at {} connections", self.addr, state.live);
                return Err(FdfsError::PoolExhausted {
                    addr: self.addr.clone(),
                    capacity: self.config.max_conns,
                });
            }
            // Reserve the slot, then dial without holding the lock
            state.live += 1;
        }

        match self.dial() {
            Ok(stream) => Ok(self.lend(stream)),
            Err(source) => {
                self.state.lock().live -= 1;
                Err(FdfsError::DialFailed {
                    addr: self.addr.clone(),
                    source,
                })
            }
        }
    }

    /// Close every idle connection and refuse further acquires.
    ///
    /// Connections still on loan are closed when they come back.
    pub fn destroy(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.live -= idle.len();
            idle
        };
        if !idle.is_empty() {
            debug!("Closing {} idle connections to {}", idle.len(), self.addr);
        }
        for stream in idle {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn capacity(&self) -> usize {
        self.config.max_conns
    }

    /// Idle plus lent connections
    pub fn live_count(&self) -> usize {
        self.state.lock().live
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> ConnPoolStatsSnapshot {
        let state = self.state.lock();
        ConnPoolStatsSnapshot {
            acquires: self.stats.acquires.load(Ordering::Relaxed),
            dials: self.stats.dials.load(Ordering::Relaxed),
            exhausted_events: self.stats.exhausted_events.load(Ordering::Relaxed),
            discarded: self.stats.discarded.load(Ordering::Relaxed),
            live: state.live,
            idle: state.idle.len(),
        }
    }

    fn lend(self: &Arc<Self>, stream: TcpStream) -> PooledConn {
        PooledConn {
            stream: Some(stream),
            pool: Arc::clone(self),
        }
    }

    fn dial(&self) -> io::Result<TcpStream> {
        self.stats.dials.fetch_add(1, Ordering::Relaxed);

        let mut last_err = None;
        for addr in self.addr.to_socket_addrs()? {
            match self.connect(&addr) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(self.config.network_timeout)?;
                    stream.set_write_timeout(self.config.network_timeout)?;
                    info!("Connected to {}", addr);
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        }))
    }

    fn connect(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        if self.config.connect_timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(addr, self.config.connect_timeout)
        }
    }

    fn return_stream(&self, stream: TcpStream) {
        let mut state = self.state.lock();
        if state.closed {
            state.live -= 1;
            drop(state);
            let _ = stream.shutdown(Shutdown::Both);
        } else {
            state.idle.push(stream);
        }
    }

    fn discard_stream(&self, stream: TcpStream) {
        self.stats.discarded.fetch_add(1, Ordering::Relaxed);
        self.state.lock().live -= 1;
        let _ = stream.shutdown(Shutdown::Both);
    }
}

/// Borrowed connection guard.
///
/// Call [`release`](Self::release) after a complete exchange to hand the
/// connection back for reuse. Dropping the guard instead closes it.
pub struct PooledConn {
    stream: Option<TcpStream>,
    pool: Arc<ConnPool>,
}

impl PooledConn {
    /// Return the connection to the idle set
    pub fn release(mut self) {
        if let Some(stream) = self.stream.take() {
            self.pool.return_stream(stream);
        }
    }

    /// Close the connection and free its pool slot
    pub fn close(mut self) {
        if let Some(stream) = self.stream.take() {
            self.pool.discard_stream(stream);
        }
    }

    pub fn addr(&self) -> &str {
        self.pool.addr()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

impl Read for PooledConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf)
    }
}

impl Write for PooledConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream()?.flush()
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Closing unreleased connection to {}", self.pool.addr());
            self.pool.discard_stream(stream);
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone)]
pub struct ConnPoolStatsSnapshot {
    pub acquires: u64,
    pub dials: u64,
    pub exhausted_events: u64,
    pub discarded: u64,
    pub live: usize,
    pub idle: usize,
}
