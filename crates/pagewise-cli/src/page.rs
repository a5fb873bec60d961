//! The `page` command.

use std::sync::Arc;

use anyhow::Context;
use pagewise_cache::{MemoryCache, QueryCache, SharedCache};
use pagewise_core::TenantContext;
use pagewise_engine::{LoadOutcome, ScrollOptions, ScrollSnapshot};
use pagewise_list::EntityList;
use pagewise_realtime::nats::NatsFeed;
use pagewise_store::Record;
use pagewise_store::rest::RestStore;
use serde::Serialize;

use crate::config::PageArgs;
use crate::shutdown::shutdown_signal;
use crate::{TRACING_TARGET_PAGE, TRACING_TARGET_WATCH};

/// Result of one run, printed to stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    resource: &'a str,
    tenant: Option<String>,
    pages: u32,
    items: usize,
    total_count: Option<u64>,
    has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    cache: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a [Record]>,
}

/// Loads pages until the resource is exhausted or `--max-pages` is reached,
/// then prints the summary. With `--watch`, keeps the first page fresh until
/// interrupted.
pub async fn run(args: PageArgs) -> anyhow::Result<()> {
    args.validate()?;
    args.log();

    let store = RestStore::new(args.rest.clone()).context("failed to create REST store")?;
    let cache = Arc::new(MemoryCache::<Record>::new());
    let options = ScrollOptions::default().with_page_size(args.page_size);

    let shared_cache: SharedCache<Record> = cache.clone();
    let mut builder = EntityList::builder(args.resource, Arc::new(store), shared_cache)
        .with_options(options)
        .with_filter(args.filter())
        .with_tenant(TenantContext::from(args.tenant));

    if args.watch {
        let feed = NatsFeed::connect(args.nats.clone())
            .await
            .context("failed to connect to NATS")?;
        builder = builder.with_feed(Arc::new(feed));
    }

    let list = builder.build().await.context("failed to create list")?;
    load_pages(&list, args.max_pages).await;

    let snapshot = list.snapshot();
    print_summary(&args, &snapshot, &cache.stats().summary())?;

    if args.watch {
        watch(&list, &args).await?;
    }

    list.dispose().await;
    match snapshot.error {
        Some(error) if snapshot.data.is_empty() => {
            Err(anyhow::anyhow!("failed to load {}: {error}", args.resource.name))
        }
        _ => Ok(()),
    }
}

async fn load_pages(list: &EntityList<Record>, max_pages: Option<u32>) {
    let outcome = list.load_initial().await;
    log_outcome(&list.snapshot(), outcome);

    while max_pages.is_none_or(|max| list.snapshot().current_page < max) {
        let outcome = list.load_more().await;
        log_outcome(&list.snapshot(), outcome);
        match outcome {
            LoadOutcome::Loaded { .. } => {}
            LoadOutcome::Skipped
            | LoadOutcome::Exhausted
            | LoadOutcome::Unchanged
            | LoadOutcome::Failed
            | LoadOutcome::Discarded => break,
        }
    }
}

fn log_outcome(snapshot: &ScrollSnapshot<Record>, outcome: LoadOutcome) {
    tracing::info!(
        target: TRACING_TARGET_PAGE,
        outcome = ?outcome,
        page = snapshot.current_page,
        items = snapshot.len(),
        total_count = ?snapshot.total_count,
        has_next_page = snapshot.has_next_page,
        "Page loaded"
    );
}

fn print_summary(
    args: &PageArgs,
    snapshot: &ScrollSnapshot<Record>,
    cache: &str,
) -> anyhow::Result<()> {
    let summary = Summary {
        resource: args.resource.name,
        tenant: args.tenant.map(|tenant| tenant.to_string()),
        pages: snapshot.current_page,
        items: snapshot.len(),
        total_count: snapshot.total_count,
        has_next_page: snapshot.has_next_page,
        error: snapshot.error.as_ref().map(ToString::to_string),
        cache: cache.to_owned(),
        data: args.print_items.then_some(snapshot.data.as_slice()),
    };

    let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
    println!("{json}");
    Ok(())
}

/// Logs every state change until a shutdown signal arrives.
async fn watch(list: &EntityList<Record>, args: &PageArgs) -> anyhow::Result<()> {
    tracing::info!(
        target: TRACING_TARGET_WATCH,
        resource = args.resource.name,
        subscribed = list.is_subscribed().await,
        "Watching for changes"
    );

    let mut updates = list.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            changed = updates.changed() => {
                changed.context("list closed while watching")?;
                let snapshot = updates.borrow_and_update().clone();
                // Skip the transient states between a refresh and its reload.
                let reset = snapshot.current_page == 0 && !snapshot.has_error();
                if reset || snapshot.is_loading || snapshot.is_loading_more {
                    continue;
                }
                tracing::info!(
                    target: TRACING_TARGET_WATCH,
                    items = snapshot.len(),
                    total_count = ?snapshot.total_count,
                    error = ?snapshot.error,
                    "List updated"
                );
            }
        }
    }

    Ok(())
}
