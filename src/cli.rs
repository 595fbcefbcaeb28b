use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::config::DEFAULT_PROC_ROOT;

#[derive(Parser)]
#[command(name = "connspy")]
#[command(version, about = "List established TCP connections and the processes that own them")]
pub struct Cli {
    /// Port number or process name to filter by
    pub query: Option<String>,

    /// Resolve the process owning each connection (needs root to see other users' processes)
    #[arg(short, long, global = true)]
    pub processes: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Sort results by field
    #[arg(short, long, value_enum, global = true)]
    pub sort: Option<SortField>,

    /// Directory standing in for /proc (Linux only)
    #[arg(long, value_name = "DIR", default_value = DEFAULT_PROC_ROOT, global = true)]
    pub proc_root: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortField {
    Port,
    Pid,
    Name,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all established connections
    List,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
