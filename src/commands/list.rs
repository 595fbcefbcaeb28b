use anyhow::Result;

use crate::cli::SortField;
use crate::config::ProbeConfig;
use crate::output::{json, table};
use crate::platform;
use crate::types::Connection;

pub struct ListOptions<'a> {
    pub config: ProbeConfig,
    pub query: Option<&'a str>,
    pub processes: bool,
    pub json: bool,
    pub sort: Option<SortField>,
}

pub fn execute(options: ListOptions<'_>) -> Result<()> {
    let scanner = platform::scanner(&options.config);
    log::debug!("Scanning with the {} backend", scanner.name());

    let mut connections: Vec<Connection> = scanner
        .connections(options.processes)?
        .filter(|c| options.query.map_or(true, |q| c.matches_query(q)))
        .collect();

    Connection::sort_vec(&mut connections, options.sort);

    if options.json {
        json::print_connections(&connections)
    } else {
        table::print_connections(&connections);
        Ok(())
    }
}
