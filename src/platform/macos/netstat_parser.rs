//! Decoder for BSD `netstat -n -p tcp` output.
//!
//! ```text
//! Active Internet connections
//! Proto Recv-Q Send-Q  Local Address          Foreign Address        (state)
//! tcp4       0      0  10.0.1.6.58287         17.248.128.52.443      ESTABLISHED
//! ```

use std::net::{IpAddr, SocketAddr};

use crate::types::Connection;

const HEADER_LINES: usize = 2;
const COLUMNS: usize = 6;
const ESTABLISHED: &str = "ESTABLISHED";

pub fn parse_netstat(output: &str) -> Vec<Connection> {
    output
        .lines()
        .skip(HEADER_LINES)
        .filter_map(parse_netstat_line)
        .collect()
}

fn parse_netstat_line(line: &str) -> Option<Connection> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() != COLUMNS || fields[5] != ESTABLISHED {
        return None;
    }

    let local = parse_dotted_endpoint(fields[3])?;
    let remote = parse_dotted_endpoint(fields[4])?;

    Some(Connection::tcp(local, remote))
}

/// `<ip>.<port>`: the last dot-separated component is the port.
fn parse_dotted_endpoint(field: &str) -> Option<SocketAddr> {
    let (ip, port) = field.rsplit_once('.')?;
    let port: u16 = port.parse().ok()?;

    match ip.parse::<IpAddr>() {
        Ok(ip) => Some(SocketAddr::new(ip, port)),
        Err(_) => {
            log::debug!("Skipping netstat endpoint with unparseable address {field:?}");
            None
        }
    }
}
