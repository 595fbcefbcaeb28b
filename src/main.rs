use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let cli = connspy::Cli::parse();
    connspy::run(cli)
}
