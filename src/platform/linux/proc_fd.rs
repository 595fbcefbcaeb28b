use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use nix::sys::stat::{stat, SFlag};

use crate::types::Proc;

/// `comm` is at most 16 bytes; read a little more in case that changes.
const COMM_READ_LIMIT: u64 = 64;

/// What one pass over the process tree found.
#[derive(Debug, Default)]
pub struct ProcessWalk {
    /// Socket inode to owning process.
    pub owners: HashMap<u64, Proc>,
    /// Network namespace inode to the pids living in it, in walk order. Any
    /// of them can stand in for the namespace when reading its socket tables.
    pub namespaces: BTreeMap<u64, Vec<u32>>,
}

/// Walk every `<root>/<pid>/fd/*` and map socket inodes to their owner,
/// grouping pids by the inode of `<root>/<pid>/ns/net` along the way.
///
/// Only an unreadable `root` is an error. Processes and descriptors that
/// disappear mid-walk are skipped.
pub fn walk_processes(root: &Path) -> Result<ProcessWalk> {
    let mut walk = ProcessWalk::default();

    let proc_dir =
        fs::read_dir(root).with_context(|| format!("Failed to read {}", root.display()))?;

    for entry in proc_dir.flatten() {
        let pid_str = entry.file_name();
        let pid_str = pid_str.to_string_lossy();

        let Ok(pid) = pid_str.parse::<u32>() else {
            continue;
        };

        if let Some(netns) = read_netns(&entry.path()) {
            walk.namespaces.entry(netns).or_default().push(pid);
        }
        walk_process_fds(root, pid, &mut walk.owners);
    }

    log::debug!(
        "Found {} socket inodes in {} network namespaces under {}",
        walk.owners.len(),
        walk.namespaces.len(),
        root.display()
    );
    Ok(walk)
}

/// Inode of the process's network namespace, `None` once it has exited.
fn read_netns(pid_dir: &Path) -> Option<u64> {
    stat(pid_dir.join("ns").join("net").as_path())
        .ok()
        .map(|st| st.st_ino as u64)
}

fn walk_process_fds(root: &Path, pid: u32, map: &mut HashMap<u64, Proc>) {
    let pid_dir = root.join(pid.to_string());
    let fd_dir = match fs::read_dir(pid_dir.join("fd")) {
        Ok(dir) => dir,
        Err(e) => {
            // Exited, or not ours to look at.
            log::trace!("Skipping pid {pid}: {e}");
            return;
        }
    };

    let mut name: Option<String> = None;

    for entry in fd_dir.flatten() {
        // stat follows the fd symlink to the socket itself
        let Ok(st) = stat(entry.path().as_path()) else {
            continue;
        };

        if SFlag::from_bits_truncate(st.st_mode) & SFlag::S_IFMT != SFlag::S_IFSOCK {
            continue;
        }

        if name.is_none() {
            let comm = read_process_name(&pid_dir);
            if comm.is_empty() {
                log::trace!("Skipping pid {pid}: no command name");
                return;
            }
            name = Some(comm);
        }

        map.insert(
            st.st_ino as u64,
            Proc {
                pid,
                name: name.clone().unwrap_or_default(),
            },
        );
    }
}

/// Empty when the process is gone.
fn read_process_name(pid_dir: &Path) -> String {
    let mut buf = Vec::with_capacity(COMM_READ_LIMIT as usize);
    let read = File::open(pid_dir.join("comm"))
        .and_then(|f| f.take(COMM_READ_LIMIT).read_to_end(&mut buf));

    if read.is_err() {
        return String::new();
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    String::from_utf8_lossy(&buf).into_owned()
}
