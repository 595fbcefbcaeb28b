use anyhow::Result;

use crate::types::Connection;

pub fn print_connections(connections: &[Connection]) -> Result<()> {
    let json = serde_json::to_string_pretty(connections)?;
    println!("{json}");
    Ok(())
}
