//! Core data types for observed connections.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;

use crate::cli::SortField;

/// One established TCP flow, optionally annotated with its owner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct Connection {
    pub transport: Transport,
    pub local_address: IpAddr,
    pub local_port: u16,
    pub remote_address: IpAddr,
    pub remote_port: u16,
    /// Socket inode, only known on the procfs backend. Zero otherwise.
    #[serde(skip)]
    pub inode: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<Proc>,
}

/// The process owning a connection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct Proc {
    pub pid: u32,
    pub name: String,
}

impl Connection {
    pub fn tcp(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            transport: Transport::Tcp,
            local_address: local.ip(),
            local_port: local.port(),
            remote_address: remote.ip(),
            remote_port: remote.port(),
            inode: 0,
            process: None,
        }
    }

    /// Local `ip:port` as lsof prints it, with IPv6 addresses bracketed.
    pub fn local_endpoint(&self) -> String {
        SocketAddr::new(self.local_address, self.local_port).to_string()
    }

    pub fn remote_endpoint(&self) -> String {
        SocketAddr::new(self.remote_address, self.remote_port).to_string()
    }

    pub fn sort_vec(connections: &mut [Connection], sort: Option<SortField>) {
        match sort {
            Some(SortField::Port) => connections.sort_by_key(|c| c.local_port),
            Some(SortField::Pid) => connections.sort_by_key(|c| c.process.as_ref().map(|p| p.pid)),
            Some(SortField::Name) => connections.sort_by(|a, b| {
                let name_a = a.process.as_ref().map(|p| &p.name);
                let name_b = b.process.as_ref().map(|p| &p.name);
                name_a.cmp(&name_b)
            }),
            None => {}
        }
    }

    /// Matches a port number against either end, anything else against the
    /// owning process name (case-insensitive substring).
    pub fn matches_query(&self, query: &str) -> bool {
        if let Ok(port) = query.parse::<u16>() {
            return self.local_port == port || self.remote_port == port;
        }

        let query = query.to_lowercase();
        self.process
            .as_ref()
            .is_some_and(|p| p.name.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(local: &str, remote: &str) -> Connection {
        Connection::tcp(local.parse().unwrap(), remote.parse().unwrap())
    }

    #[test]
    fn test_local_endpoint_ipv4() {
        let c = conn("127.0.0.1:48094", "127.0.0.1:4039");
        assert_eq!(c.local_endpoint(), "127.0.0.1:48094");
        assert_eq!(c.remote_endpoint(), "127.0.0.1:4039");
    }

    #[test]
    fn test_local_endpoint_ipv6_is_bracketed() {
        let c = conn("[::1]:5432", "[::1]:60000");
        assert_eq!(c.local_endpoint(), "[::1]:5432");
    }

    #[test]
    fn test_transport_serializes_lowercase() {
        let c = conn("10.0.0.1:22", "10.0.0.2:51000");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["transport"], "tcp");
        assert!(json.get("inode").is_none());
        assert!(json.get("process").is_none());
    }

    #[test]
    fn test_matches_query_port_and_name() {
        let mut c = conn("10.0.0.1:22", "10.0.0.2:51000");
        assert!(c.matches_query("22"));
        assert!(c.matches_query("51000"));
        assert!(!c.matches_query("sshd"));

        c.process = Some(Proc {
            pid: 812,
            name: "sshd".to_string(),
        });
        assert!(c.matches_query("SSH"));
        assert!(!c.matches_query("nginx"));
    }

    #[test]
    fn test_sort_by_pid_puts_unowned_first() {
        let mut a = conn("10.0.0.1:22", "10.0.0.2:51000");
        a.process = Some(Proc {
            pid: 9,
            name: "b".to_string(),
        });
        let b = conn("10.0.0.1:80", "10.0.0.2:51001");
        let mut v = vec![a.clone(), b.clone()];
        Connection::sort_vec(&mut v, Some(SortField::Pid));
        assert_eq!(v, vec![b, a]);
    }
}
