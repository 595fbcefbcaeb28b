//! Platform backends and the entry point that picks one.
//!
//! Both backends compile everywhere so their decoders can be tested on any
//! host; [`scanner`] picks the one matching the running OS.

use std::sync::Arc;

use anyhow::Result;

use crate::config::ProbeConfig;
use crate::pool::BufferPool;
use crate::types::Connection;

pub mod linux;
pub mod macos;

pub use linux::ProcfsScanner;
pub use macos::NetstatScanner;

/// A single pass over one snapshot of established connections.
pub type Connections = Box<dyn Iterator<Item = Connection> + Send>;

/// Enumerates established TCP connections, optionally with their owners.
pub trait Scanner: Send + Sync {
    /// Backend name (e.g., "procfs", "netstat")
    fn name(&self) -> &'static str;

    /// Take a fresh snapshot.
    ///
    /// Resolving owners walks the whole process table, which is slower and
    /// needs privileges to see other users' processes, so it is opt-in.
    fn connections(&self, with_processes: bool) -> Result<Connections>;
}

/// Backend for the running OS with its own buffer pool.
pub fn scanner(config: &ProbeConfig) -> Box<dyn Scanner> {
    scanner_with_pool(config, Arc::new(BufferPool::default()))
}

/// Like [`scanner`], sharing `pool` with other scanners.
#[cfg(target_os = "linux")]
pub fn scanner_with_pool(config: &ProbeConfig, pool: Arc<BufferPool>) -> Box<dyn Scanner> {
    Box::new(ProcfsScanner::new(config.proc_root(), pool))
}

#[cfg(not(target_os = "linux"))]
pub fn scanner_with_pool(_config: &ProbeConfig, _pool: Arc<BufferPool>) -> Box<dyn Scanner> {
    Box::new(NetstatScanner::new())
}
