use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use crate::types::Connection;

pub fn print_connections(connections: &[Connection]) {
    if connections.is_empty() {
        println!("{}", "No results found".yellow());
        return;
    }

    // Only show owner columns when resolution was asked for and found something
    let has_process = connections.iter().any(|c| c.process.is_some());

    let mut table = Table::new();

    let mut headers = vec!["PROTO", "LOCAL", "REMOTE"];
    if has_process {
        headers.push("PID");
        headers.push("PROCESS");
    }
    table.set_header(headers);

    for connection in connections {
        let mut row = vec![
            Cell::new(connection.transport).fg(Color::Cyan),
            Cell::new(connection.local_endpoint()),
            Cell::new(connection.remote_endpoint()),
        ];

        if has_process {
            match &connection.process {
                Some(process) => {
                    row.push(Cell::new(process.pid));
                    row.push(Cell::new(&process.name).fg(Color::Green));
                }
                None => {
                    row.push(Cell::new("-").fg(Color::DarkGrey));
                    row.push(Cell::new("-").fg(Color::DarkGrey));
                }
            }
        }

        table.add_row(row);
    }

    println!("{table}");
    println!("\n{} connection(s)", connections.len().to_string().green());
}
