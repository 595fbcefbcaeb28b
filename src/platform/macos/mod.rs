//! Backend for hosts without a readable socket table: shells out to
//! `netstat` for connections and `lsof` for their owners.

pub mod lsof;
pub mod netstat_parser;

use std::collections::HashMap;
use std::process::Command;

use anyhow::{bail, Context, Result};

use super::{Connections, Scanner};
use crate::types::{Connection, Proc};
use lsof::parse_lsof;
use netstat_parser::parse_netstat;

const NETSTAT_BINARY: &str = "netstat";
// -W keeps long IPv6 addresses whole instead of cutting them to the column
// width, so every local endpoint can match an lsof key.
const NETSTAT_ARGS: &[&str] = &["-n", "-W", "-p", "tcp"];

const LSOF_BINARY: &str = "lsof";
// Internet sockets only, no name or port resolution, no warnings,
// newline-separated command and name fields. Keys are compared with the
// wide (-W) netstat addresses above.
const LSOF_ARGS: &[&str] = &["-i", "-n", "-P", "-w", "-F", "cn"];

#[derive(Debug, Default)]
pub struct NetstatScanner;

impl NetstatScanner {
    pub fn new() -> Self {
        Self
    }
}

impl Scanner for NetstatScanner {
    fn name(&self) -> &'static str {
        "netstat"
    }

    fn connections(&self, with_processes: bool) -> Result<Connections> {
        let mut connections = parse_netstat(&run(NETSTAT_BINARY, NETSTAT_ARGS)?);

        if with_processes {
            let owners = parse_lsof(&run(LSOF_BINARY, LSOF_ARGS)?)?;
            annotate(&mut connections, &owners);
        }

        log::debug!("netstat reported {} established connections", connections.len());
        Ok(Box::new(connections.into_iter()))
    }
}

fn annotate(connections: &mut [Connection], owners: &HashMap<String, Proc>) {
    for connection in connections {
        connection.process = owners.get(&connection.local_endpoint()).cloned();
    }
}

fn run(binary: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {binary}"))?;

    if !output.status.success() {
        bail!(
            "{binary} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    String::from_utf8(output.stdout).with_context(|| format!("Invalid UTF-8 from {binary}"))
}
