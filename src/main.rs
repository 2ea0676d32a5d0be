mod app;
mod cli;
mod db;
mod paths;
mod player;
mod prefs;
mod store;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    app::run(cli)
}
