//! Backend reading the kernel's socket tables and process tree from procfs.

pub mod proc_fd;
pub mod proc_parser;

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use super::{Connections, Scanner};
use crate::pool::{BufferPool, PooledBuffer};
use crate::types::{Connection, Proc};
use proc_fd::{walk_processes, ProcessWalk};
use proc_parser::{validate_header, ProcNet};

pub struct ProcfsScanner {
    root: PathBuf,
    pool: Arc<BufferPool>,
}

impl ProcfsScanner {
    pub fn new(root: impl Into<PathBuf>, pool: Arc<BufferPool>) -> Self {
        Self {
            root: root.into(),
            pool,
        }
    }

    /// Fill a pooled buffer with `net/tcp` and `net/tcp6`, then the same pair
    /// for every other network namespace seen during the process walk.
    fn read_socket_tables(&self, namespaces: &BTreeMap<u64, Vec<u32>>) -> Result<PooledBuffer> {
        let mut buf = self.pool.acquire();

        read_table_pair(&self.root.join("net"), &mut buf)?;

        for (netns, pids) in namespaces {
            // Every pid in a namespace sees the same tables; the first one
            // still around will do.
            let found = pids.iter().any(|pid| {
                let net = self.root.join(pid.to_string()).join("net");
                match read_table_pair(&net, &mut buf) {
                    Ok(()) => true,
                    Err(e) => {
                        log::trace!("Skipping pid {pid} for namespace {netns}: {e:#}");
                        false
                    }
                }
            });

            if !found {
                log::debug!("No readable socket table for network namespace {netns}");
            }
        }

        Ok(buf)
    }
}

impl Scanner for ProcfsScanner {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn connections(&self, with_processes: bool) -> Result<Connections> {
        let (owners, namespaces) = if with_processes {
            let ProcessWalk { owners, namespaces } = walk_processes(&self.root)?;
            (Some(owners), namespaces)
        } else {
            (None, BTreeMap::new())
        };

        let buf = self.read_socket_tables(&namespaces)?;

        Ok(Box::new(ProcNetConnections {
            decoder: Some(ProcNet::new(buf)),
            owners,
        }))
    }
}

/// `tcp` is required, `tcp6` is absent on kernels without IPv6. On error
/// the buffer is left as it was before the call.
fn read_table_pair(net: &Path, buf: &mut Vec<u8>) -> Result<()> {
    let start = buf.len();

    read_table(&net.join("tcp"), buf)?;

    match read_table(&net.join("tcp6"), buf) {
        Ok(()) => Ok(()),
        Err(e) if is_not_found(&e) => {
            log::debug!("No IPv6 socket table under {}", net.display());
            Ok(())
        }
        Err(e) => {
            buf.truncate(start);
            Err(e)
        }
    }
}

/// Append one table to `buf`. On error nothing is appended.
fn read_table(path: &Path, buf: &mut Vec<u8>) -> Result<()> {
    let start = buf.len();

    let read = File::open(path)
        .and_then(|mut f| f.read_to_end(buf))
        .with_context(|| format!("Failed to read {}", path.display()));
    let checked = read.and_then(|_| validate_header(&buf[start..], &path.display().to_string()));

    if let Err(e) = checked {
        buf.truncate(start);
        return Err(e);
    }

    if buf.len() > start && buf.last() != Some(&b'\n') {
        buf.push(b'\n');
    }
    Ok(())
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Connections decoded straight out of the pooled buffer.
///
/// The decoder, and with it the buffer, is dropped as soon as the table is
/// exhausted so the buffer goes back to the pool before the iterator does.
struct ProcNetConnections {
    decoder: Option<ProcNet<PooledBuffer>>,
    owners: Option<HashMap<u64, Proc>>,
}

impl Iterator for ProcNetConnections {
    type Item = Connection;

    fn next(&mut self) -> Option<Connection> {
        let decoder = self.decoder.as_mut()?;

        let Some(mut connection) = decoder.next() else {
            self.decoder = None;
            return None;
        };

        if let Some(owners) = &self.owners {
            connection.process = owners.get(&connection.inode).cloned();
        }

        Some(connection)
    }
}
