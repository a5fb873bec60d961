#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod page;
mod shutdown;
mod telemetry;

use std::process;

use anyhow::Context;
use pagewise_list::ListResource;

use crate::config::{Cli, Command};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "pagewise_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "pagewise_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "pagewise_cli::config";
pub const TRACING_TARGET_PAGE: &str = "pagewise_cli::page";
pub const TRACING_TARGET_WATCH: &str = "pagewise_cli::watch";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %format!("{error:#}"),
            "pagewise terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    telemetry::init_tracing(cli.json_logs)?;
    cli.log_build_info();

    match cli.command {
        Command::Page(args) => page::run(args).await,
        Command::Resources => {
            let json = serde_json::to_string_pretty(ListResource::ALL)
                .context("failed to encode resource catalogue")?;
            println!("{json}");
            Ok(())
        }
    }
}
