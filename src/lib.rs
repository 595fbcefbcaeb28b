//! Established TCP connections on this host, optionally resolved to the
//! process that owns each one.
//!
//! ```no_run
//! use connspy::{platform, ProbeConfig};
//!
//! let scanner = platform::scanner(&ProbeConfig::default());
//! for connection in scanner.connections(true)? {
//!     println!("{} -> {}", connection.local_endpoint(), connection.remote_endpoint());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod output;
pub mod platform;
pub mod pool;
pub mod types;

pub use cli::Cli;
pub use config::ProbeConfig;
pub use platform::{scanner, Connections, Scanner};
pub use types::{Connection, Proc, Transport};

use anyhow::Result;

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(cli::Commands::Completions { shell }) => {
            commands::completions::execute(shell);
            Ok(())
        }
        Some(cli::Commands::List) | None => commands::list::execute(commands::list::ListOptions {
            config: ProbeConfig::default().with_proc_root(&cli.proc_root),
            query: cli.query.as_deref(),
            processes: cli.processes,
            json: cli.json,
            sort: cli.sort,
        }),
    }
}
