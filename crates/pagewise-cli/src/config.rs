//! CLI configuration.
//!
//! ```text
//! Cli
//! ├── json_logs
//! └── command
//!     ├── page: PageArgs
//!     │   ├── rest: RestConfig       # REST endpoint, API key, timeout
//!     │   ├── nats: NatsFeedConfig   # change feed, used with --watch
//!     │   └── resource, tenant, filters, paging limits
//!     └── resources
//! ```
//!
//! Every option can also be given through the environment.

use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pagewise_core::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, TenantId};
use pagewise_list::{ListFilter, ListResource};
use pagewise_realtime::nats::NatsFeedConfig;
use pagewise_store::rest::RestConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagewise")]
#[command(about = "Pages through tenant-scoped list resources")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "PAGEWISE_JSON_LOGS", global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load a resource page by page and print a JSON summary
    Page(PageArgs),
    /// Print the catalogue of list resources
    Resources,
}

/// Options of the `page` command.
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Resource to list, see `pagewise resources`
    #[arg(long, env = "PAGEWISE_RESOURCE", value_parser = parse_resource)]
    pub resource: ListResource,

    /// Tenant (company) id; without it every page is empty
    #[arg(long, env = "PAGEWISE_TENANT")]
    pub tenant: Option<TenantId>,

    /// Free-text search over the resource's searchable columns
    #[arg(long)]
    pub search: Option<String>,

    /// Equality filter as `column=value`; repeatable
    #[arg(long = "eq", value_name = "COLUMN=VALUE", value_parser = parse_equals)]
    pub equals: Vec<(String, String)>,

    /// Rows per page
    #[arg(long, env = "PAGEWISE_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Keep running and refresh on change events until interrupted
    #[arg(long)]
    pub watch: bool,

    /// Include the loaded rows in the summary
    #[arg(long)]
    pub print_items: bool,

    #[command(flatten)]
    pub rest: RestConfig,

    #[command(flatten)]
    pub nats: NatsFeedConfig,
}

fn parse_resource(name: &str) -> Result<ListResource, String> {
    ListResource::find(name).ok_or_else(|| {
        let known: Vec<_> = ListResource::ALL.iter().map(|r| r.name).collect();
        format!("unknown resource '{name}', expected one of: {}", known.join(", "))
    })
}

fn parse_equals(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(format!("expected COLUMN=VALUE, got '{pair}'")),
    }
}

impl Cli {
    /// Loads `.env` (when enabled) and parses the command line.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs build information at debug level.
    pub fn log_build_info(&self) {
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            "Starting pagewise"
        );
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

impl PageArgs {
    /// Validates the endpoint settings this run needs.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        );
        self.rest
            .validate()
            .context("invalid REST configuration")?;
        if self.watch {
            self.nats
                .validate()
                .context("invalid NATS configuration")?;
        }
        Ok(())
    }

    /// Builds the list filter from the command line.
    pub fn filter(&self) -> ListFilter {
        let mut filter = ListFilter::new();
        if let Some(search) = &self.search {
            filter = filter.with_search(search.clone());
        }
        for (column, value) in &self.equals {
            filter = filter.with_equals(column.clone(), value.clone());
        }
        filter
    }

    /// Logs the configuration without secrets.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            resource = self.resource.name,
            tenant = ?self.tenant,
            page_size = self.page_size,
            max_pages = ?self.max_pages,
            watch = self.watch,
            rest = ?self.rest,
            "Page configuration"
        );
    }
}
