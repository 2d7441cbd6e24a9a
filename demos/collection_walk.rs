//! Walk a collection search and print every matching record as JSON lines.
//!
//! ```text
//! cargo run --example collection_walk -- \
//!     --search-url https://collectionapi.metmuseum.org/public/collection/v1/search \
//!     --detail-url https://collectionapi.metmuseum.org/public/collection/v1/objects \
//!     --query sunflowers
//! ```
//!
//! `FETCH_MAX_RETRIES`, `FETCH_CONCURRENCY`, `FETCH_PAGE_SIZE` and
//! `FETCH_TIMEOUT_SECS` override the defaults; `LOG_FORMAT=json` switches the
//! log output to JSON. Ctrl+C cancels the walk.

use anyhow::{Context, Result};
use clap::Parser;
use collection_fetcher::harvest::config::HarvestConfig;
use collection_fetcher::{CancellationSource, CollectionHarvester, FetchError};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collection_walk", about = "Fetch every record matching a collection search")]
struct Args {
    /// Search endpoint returning a total and a list of identifiers.
    /// Receives `q`, `page` (1-based) and `pageSize`; endpoints without paging
    /// may ignore the last two and return every identifier at once.
    #[arg(long)]
    search_url: String,

    /// Detail endpoint; the identifier is appended as a path segment
    #[arg(long)]
    detail_url: String,

    /// Search term sent as the `q` parameter
    #[arg(long, short)]
    query: String,

    /// JSON field holding the identifier list
    #[arg(long, default_value = "objectIDs")]
    ids_field: String,

    /// JSON field holding the total result count
    #[arg(long, default_value = "total")]
    total_field: String,

    /// Stop after this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Override the detail fetch window size
    #[arg(long, env = "FETCH_CONCURRENCY")]
    concurrency: Option<usize>,
}

fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("collection_fetcher=info"));

    if json_format {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Pull `(total, ids)` out of a search response. Servers send `null` for no hits.
fn parse_search_page(body: &Value, total_field: &str, ids_field: &str) -> Result<(usize, Vec<u64>), FetchError> {
    let total = body
        .get(total_field)
        .and_then(Value::as_u64)
        .ok_or_else(|| FetchError::Decoding(format!("missing numeric field `{total_field}`")))?;
    let ids = match body.get(ids_field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_u64).collect(),
        Some(other) => {
            return Err(FetchError::Decoding(format!(
                "field `{ids_field}` is not an array: {other}"
            )))
        }
    };
    Ok((total as usize, ids))
}

/// Query for one search page.
fn search_params(query: String, page: u32, page_size: u32) -> [(&'static str, String); 3] {
    [("q", query), ("page", page.to_string()), ("pageSize", page_size.to_string())]
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = HarvestConfig::from_env().context("invalid FETCH_* environment")?;
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }

    let source = CancellationSource::new();
    tokio::spawn({
        let source = source.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - cancelling walk...");
                source.cancel();
            }
        }
    });

    let harvester = CollectionHarvester::new(config)
        .with_cancellation(source.token())
        .with_label("records");
    let search = harvester.transport();
    let detail = search.clone();
    let detail_base = args.detail_url.trim_end_matches('/').to_string();

    let mut records = harvester
        .harvest(
            |page, size| {
                let transport = search.clone();
                let url = args.search_url.clone();
                let query = args.query.clone();
                let total_field = args.total_field.clone();
                let ids_field = args.ids_field.clone();
                async move {
                    let body: Value = transport.get_json(&url, &search_params(query, page, size)).await?;
                    parse_search_page(&body, &total_field, &ids_field)
                }
            },
            move |id| {
                let transport = detail.clone();
                let url = format!("{detail_base}/{id}");
                async move { transport.get_json::<Value>(&url, &[]).await }
            },
        )
        .await
        .context("identifier resolution failed")?;

    let limit = args.limit.unwrap_or(usize::MAX);
    let mut printed = 0;
    while printed < limit {
        let Some(record) = records.next().await else {
            break;
        };
        let record = record.context("record fetch failed")?;
        println!("{record}");
        printed += 1;
    }

    info!(printed, "Collection walk finished");
    Ok(())
}
