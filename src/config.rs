use std::path::{Path, PathBuf};

/// Where the kernel's pseudo-filesystem is mounted.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Settings handed to a scanner at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    proc_root: PathBuf,
}

impl ProbeConfig {
    /// Point the procfs backend at a substitute tree (tests, containers with
    /// the host's `/proc` bind-mounted elsewhere).
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
        }
    }
}
