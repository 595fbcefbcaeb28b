//! Decoder for `lsof -F` field output.
//!
//! Each line is a one-letter field id followed by its value:
//!
//! ```text
//! p25196                              <- process id, starts a new process
//! ccello-app                          <- command name
//! f12                                 <- descriptor, ignored
//! n127.0.0.1:48094->127.0.0.1:4039    <- connected socket
//! n*:4040                             <- listening socket, ignored
//! ```

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::types::Proc;

/// Map each connected socket's local `ip:port` to its owning process.
///
/// A later record with the same local address replaces an earlier one.
pub fn parse_lsof(output: &str) -> Result<HashMap<String, Proc>> {
    let mut owners = HashMap::new();
    let mut current = Proc {
        pid: 0,
        name: String::new(),
    };

    for line in output.lines() {
        if line.len() <= 1 {
            continue;
        }

        let mut chars = line.chars();
        let field = chars.next().unwrap_or_default();
        let value = chars.as_str();

        match field {
            'p' => {
                current.pid = value
                    .parse()
                    .with_context(|| format!("Invalid 'p' field in lsof output: {value:?}"))?;
            }
            'c' => current.name = value.to_string(),
            'f' => {}
            'n' => {
                let Some((local, _remote)) = value.split_once("->") else {
                    continue;
                };
                owners.insert(local.to_string(), current.clone());
            }
            _ => bail!("Unexpected lsof field {field:?} in {line:?}"),
        }
    }

    Ok(owners)
}
