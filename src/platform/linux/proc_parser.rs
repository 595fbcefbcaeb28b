//! Decoder for the kernel TCP socket tables (`/proc/net/tcp`, `/proc/net/tcp6`).

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use anyhow::{bail, Context, Result};

use crate::types::Connection;

/// Column holding the socket inode, counting from zero.
const INODE_FIELD: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSocket {
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub state: SocketState,
    pub inode: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown(u8),
}

impl SocketState {
    pub fn from_hex(hex: &str) -> Result<Self> {
        let num = u8::from_str_radix(hex, 16).with_context(|| format!("Invalid state hex {hex:?}"))?;
        Ok(match num {
            0x01 => SocketState::Established,
            0x02 => SocketState::SynSent,
            0x03 => SocketState::SynRecv,
            0x04 => SocketState::FinWait1,
            0x05 => SocketState::FinWait2,
            0x06 => SocketState::TimeWait,
            0x07 => SocketState::Close,
            0x08 => SocketState::CloseWait,
            0x09 => SocketState::LastAck,
            0x0A => SocketState::Listen,
            0x0B => SocketState::Closing,
            n => SocketState::Unknown(n),
        })
    }
}

/// The kernel prints each 32-bit address word as a host-order integer, so
/// the bytes come back out with `to_ne_bytes`.
fn parse_hex_word(hex: &str) -> Result<[u8; 4]> {
    let word = u32::from_str_radix(hex, 16).with_context(|| format!("Invalid address hex {hex:?}"))?;
    Ok(word.to_ne_bytes())
}

pub fn parse_hex_addr(hex: &str) -> Result<IpAddr> {
    if !hex.is_ascii() {
        bail!("Invalid address hex {hex:?}");
    }

    match hex.len() {
        8 => Ok(Ipv4Addr::from(parse_hex_word(hex)?).into()),
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                chunk.copy_from_slice(&parse_hex_word(&hex[i * 8..(i + 1) * 8])?);
            }
            Ok(Ipv6Addr::from(octets).into())
        }
        n => bail!("Invalid address length: {n} (expected 8 or 32)"),
    }
}

/// `ADDR:PORT` where the port is plain big-endian hex.
pub fn parse_hex_endpoint(field: &str) -> Result<SocketAddr> {
    let (addr_hex, port_hex) = field
        .split_once(':')
        .with_context(|| format!("Invalid endpoint format {field:?}"))?;
    let port = u16::from_str_radix(port_hex, 16).with_context(|| format!("Invalid port hex {port_hex:?}"))?;

    Ok(SocketAddr::new(parse_hex_addr(addr_hex)?, port))
}

/// Parse one data row. A row cut short after the state column decodes with
/// inode 0 rather than failing, since the table may be read mid-update.
pub fn parse_socket_line(line: &str) -> Result<RawSocket> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() < 4 {
        bail!("Invalid socket line: not enough fields in {line:?}");
    }

    let inode = match parts.get(INODE_FIELD) {
        Some(inode) => inode.parse().with_context(|| format!("Invalid inode {inode:?}"))?,
        None => 0,
    };

    Ok(RawSocket {
        local: parse_hex_endpoint(parts[1])?,
        remote: parse_hex_endpoint(parts[2])?,
        state: SocketState::from_hex(parts[3])?,
        inode,
    })
}

fn is_header(line: &str) -> bool {
    line.split_whitespace().next() == Some("sl")
}

/// Reject a table whose first line isn't the kernel's column header. An
/// empty table is fine.
pub fn validate_header(table: &[u8], source: &str) -> Result<()> {
    let first = table.split(|b| *b == b'\n').next().unwrap_or_default();
    if first.is_empty() || std::str::from_utf8(first).is_ok_and(is_header) {
        return Ok(());
    }

    bail!(
        "Unexpected header in {source}: {:?}",
        String::from_utf8_lossy(first)
    )
}

/// Lazily decodes ESTABLISHED connections out of one or more concatenated
/// socket tables.
///
/// Owns its buffer; dropping the decoder drops the buffer. Not restartable.
#[derive(Debug)]
pub struct ProcNet<B> {
    buf: B,
    pos: usize,
    seen: HashSet<u64>,
}

impl<B: AsRef<[u8]>> ProcNet<B> {
    pub fn new(buf: B) -> Self {
        let mut net = Self {
            buf,
            pos: 0,
            seen: HashSet::new(),
        };
        // header
        net.next_line();
        net
    }

    fn next_line(&mut self) -> Option<(usize, usize)> {
        let bytes = self.buf.as_ref();
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let end = bytes[start..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(bytes.len(), |i| start + i);
        self.pos = end + 1;

        Some((start, end))
    }
}

impl<B: AsRef<[u8]>> Iterator for ProcNet<B> {
    type Item = Connection;

    fn next(&mut self) -> Option<Connection> {
        loop {
            let (start, end) = self.next_line()?;
            let Ok(line) = std::str::from_utf8(&self.buf.as_ref()[start..end]) else {
                log::debug!("Skipping non-UTF-8 socket table line");
                continue;
            };

            if line.trim().is_empty() || is_header(line) {
                continue;
            }

            let socket = match parse_socket_line(line) {
                Ok(socket) => socket,
                Err(e) => {
                    log::debug!("Skipping socket table line: {e:#}");
                    continue;
                }
            };

            if socket.state != SocketState::Established {
                continue;
            }

            if socket.inode != 0 && !self.seen.insert(socket.inode) {
                log::trace!("Skipping duplicate socket inode {}", socket.inode);
                continue;
            }

            let mut connection = Connection::tcp(socket.local, socket.remote);
            connection.inode = socket.inode;
            return Some(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";
    const HEADER6: &str = "  sl  local_address                         remote_address                        st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

    fn decode(content: &str) -> Vec<Connection> {
        ProcNet::new(content.as_bytes()).collect()
    }

    #[test]
    fn test_parse_hex_addr_localhost() {
        let result = parse_hex_addr("0100007F").unwrap();
        assert_eq!(result, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn test_parse_hex_addr_192_168_1_5() {
        let result = parse_hex_addr("0501A8C0").unwrap();
        assert_eq!(result, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)));
    }

    #[test]
    fn test_parse_hex_addr_v6_loopback() {
        let result = parse_hex_addr("00000000000000000000000001000000").unwrap();
        assert_eq!(result, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_parse_hex_addr_v6_ipv4_mapped() {
        let result = parse_hex_addr("0000000000000000FFFF00000100007F").unwrap();
        assert_eq!(result, "::ffff:127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_hex_addr_invalid_length() {
        assert!(parse_hex_addr("0100007F00").is_err());
    }

    #[test]
    fn test_parse_hex_endpoint_port() {
        let result = parse_hex_endpoint("0100007F:1F90").unwrap();
        assert_eq!(result, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_socket_state_codes() {
        assert_eq!(SocketState::from_hex("01").unwrap(), SocketState::Established);
        assert_eq!(SocketState::from_hex("0A").unwrap(), SocketState::Listen);
        assert_eq!(SocketState::from_hex("0C").unwrap(), SocketState::Unknown(12));
        assert!(SocketState::from_hex("ZZ").is_err());
    }

    #[test]
    fn test_parse_socket_line_established_ipv4() {
        let line = "   1: 0100007F:1F90 0501A8C0:D431 01 00000000:00000000 00:00000000 00000000   500        0 12346 1 0000000000000000 100 0 0 10 0";

        let result = parse_socket_line(line).unwrap();

        assert_eq!(result.local, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(result.remote, "192.168.1.5:54321".parse().unwrap());
        assert_eq!(result.state, SocketState::Established);
        assert_eq!(result.inode, 12346);
    }

    #[test]
    fn test_parse_socket_line_too_short() {
        assert!(parse_socket_line("broken line").is_err());
    }

    #[test]
    fn test_single_established_row_among_listeners() {
        let content = format!(
            "{HEADER}
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000   500        0 12345 1 0000000000000000 100 0 0 10 0
   1: A12CF62E:E4D7 57FC1EC0:01BB 01 00000000:00000000 02:000006FA 00000000  1000        0 639474 2 ffff88007e75a740 48 4 26 10 -1
   2: 00000000:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 12347 1 0000000000000000 100 0 0 10 0
"
        );

        let result = decode(&content);

        assert_eq!(result.len(), 1);
        let c = &result[0];
        assert_eq!(c.local_address, IpAddr::V4(Ipv4Addr::new(46, 246, 44, 161)));
        assert_eq!(c.local_port, 0xE4D7);
        assert_eq!(c.remote_address, IpAddr::V4(Ipv4Addr::new(192, 30, 252, 87)));
        assert_eq!(c.remote_port, 443);
        assert_eq!(c.inode, 639474);
        assert!(c.process.is_none());
    }

    #[test]
    fn test_ipv6_table_appended_after_ipv4() {
        let content = format!(
            "{HEADER}
   0: 0100007F:0019 0100007F:A6C0 01 00000000:00000000 00:00000000 00000000     0        0 10550 1 ffff8800a729b780 100 0 0 10 0
{HEADER6}
   8: 4500032000BE692B8AE31EBD919D9D10:D61C 5014002A080805400000000015100000:01BB 01 00000000:00000000 02:00000045 00000000  1000        0 36856710 2 ffff88010b796080 22 4 30 8 7
"
        );

        let result = decode(&content);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].inode, 10550);
        assert_eq!(
            result[1].local_address,
            "2003:45:2b69:be00:bd1e:e38a:109d:9d91".parse::<IpAddr>().unwrap()
        );
        assert_eq!(result[1].local_port, 0xD61C);
        assert_eq!(
            result[1].remote_address,
            "2a00:1450:4005:808::1015".parse::<IpAddr>().unwrap()
        );
        assert_eq!(result[1].remote_port, 443);
        assert_eq!(result[1].inode, 36856710);
    }

    #[test]
    fn test_truncated_and_broken_lines_do_not_abort() {
        let content = format!(
            "{HEADER}
   0: 00000000:A6C0 00000000:0000 01 000000
broken line
"
        );

        let result = decode(&content);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].local_port, 0xA6C0);
        assert_eq!(result[0].inode, 0);
    }

    #[test]
    fn test_malformed_hex_line_is_skipped() {
        let content = format!(
            "{HEADER}
   0: 0100007G:1F90 0501A8C0:D431 01 00000000:00000000 00:00000000 00000000   500        0 1 1 0 100 0 0 10 0
   1: 0100007F:1F90 0501A8C0:D431 01 00000000:00000000 00:00000000 00000000   500        0 2 1 0 100 0 0 10 0"
        );

        let result = decode(&content);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].inode, 2);
    }

    #[test]
    fn test_duplicate_inodes_yield_once() {
        let content = format!(
            "{HEADER}
   0: 00000000:A6C0 00000000:0000 01 00000000:00000000 00:00000000 00000000   105        0 5107 1 ffff8800a6aaf040 100 0 0 10 0
   1: 00000000:A6C0 00000000:0000 01 00000000:00000000 00:00000000 00000000   105        0 5107 1 ffff8800a6aaf040 100 0 0 10 0
"
        );

        assert_eq!(decode(&content).len(), 1);
    }

    #[test]
    fn test_header_only_and_empty_tables() {
        assert!(decode(HEADER).is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_validate_header() {
        assert!(validate_header(HEADER.as_bytes(), "tcp").is_ok());
        assert!(validate_header(b"", "tcp").is_ok());
        assert!(validate_header(b"   0: 0100007F:1F90 00000000:0000 0A\n", "tcp").is_err());
    }
}
