use indicatif::{ProgressBar, ProgressStyle};
use pagetree_scanner::{
    CachedFetcher, Crawler, HttpFetcher, NodeState, OpenPageRank, PageTree, ScanError,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub urls: Vec<String>,
    pub depth: usize,
    pub threads: usize,
    pub max_pages: Option<usize>,
    pub timeout_secs: u64,
    pub cache: bool,
    pub strict_rank: bool,
    pub rank_api_key: Option<String>,
    /// Replaces the public Open PageRank endpoint when set.
    pub rank_endpoint: Option<String>,
    pub show_progress_bars: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            depth: 1,
            threads: 4,
            max_pages: None,
            timeout_secs: 10,
            cache: false,
            strict_rank: false,
            rank_api_key: None,
            rank_endpoint: None,
            show_progress_bars: false,
        }
    }
}

/// A link that was found but did not become a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedBranch {
    pub url: String,
    pub reason: String,
}

/// A tree built from one seed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTree {
    pub seed: String,
    pub tree: PageTree,
    pub dropped: Vec<DroppedBranch>,
}

/// A seed URL that could not be crawled at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFailure {
    pub seed: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub trees: Vec<SeedTree>,
    pub failures: Vec<SeedFailure>,
}

impl CrawlOutcome {
    pub fn all_failed(&self) -> bool {
        self.trees.is_empty() && !self.failures.is_empty()
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Assembles a crawler from the options. Shared by every seed of one run.
pub fn build_crawler(options: &CrawlOptions) -> Result<Crawler, ScanError> {
    let mut crawler = Crawler::with_timeout(options.timeout_secs)?
        .with_workers(options.threads)
        .with_strict_rank(options.strict_rank);

    if options.cache {
        let fetcher = HttpFetcher::with_timeout(options.timeout_secs)?;
        crawler = crawler.with_fetcher(Arc::new(CachedFetcher::new(fetcher)));
    }
    if let Some(max_pages) = options.max_pages {
        crawler = crawler.with_max_pages(max_pages);
    }
    if let Some(ref key) = options.rank_api_key {
        let mut ranker = OpenPageRank::new(key.clone())?;
        if let Some(ref endpoint) = options.rank_endpoint {
            ranker = ranker.with_endpoint(endpoint.clone());
        }
        crawler = crawler.with_ranker(Arc::new(ranker));
    }

    Ok(crawler)
}

/// Execute a crawl with the given options
/// Returns one tree per seed that could be fetched
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutcome, String> {
    let crawler = build_crawler(&options).map_err(|e| format!("Failed to set up crawler: {}", e))?;
    crawl_seeds(crawler, options, progress_callback).await
}

/// Runs an already configured crawler over every seed in `options.urls`.
pub async fn crawl_seeds(
    crawler: Crawler,
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlOutcome, String> {
    let CrawlOptions {
        urls,
        depth,
        show_progress_bars,
        ..
    } = options;

    if urls.is_empty() {
        return Err("No seed URLs to crawl".to_string());
    }

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .map_err(|e| e.to_string())?,
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let fetched_count = Arc::new(AtomicUsize::new(0));
    let dropped: Arc<StdMutex<Vec<DroppedBranch>>> = Arc::new(StdMutex::new(Vec::new()));

    let pb_clone = progress_bar.clone();
    let count_clone = fetched_count.clone();
    let crawler = crawler
        .with_progress_callback(Arc::new(move |state: NodeState, url: String| {
            if state != NodeState::Fetching {
                return;
            }
            let count = count_clone.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref pb) = pb_clone {
                pb.set_message(format!(
                    "Crawling... {} pages fetched ({})",
                    count,
                    extract_url_path(&url)
                ));
            }
        }))
        .with_drop_callback({
            let dropped = dropped.clone();
            Arc::new(move |url: String, reason: &ScanError| {
                if let Ok(mut dropped) = dropped.lock() {
                    dropped.push(DroppedBranch {
                        url,
                        reason: reason.to_string(),
                    });
                }
            })
        });

    let mut outcome = CrawlOutcome::default();
    for (idx, seed) in urls.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && urls.len() > 1
        {
            callback(format!("Crawling seed {}/{}: {}", idx + 1, urls.len(), seed));
        }

        match crawler.build(seed, depth).await {
            Ok(tree) => {
                let dropped = dropped
                    .lock()
                    .map(|mut d| std::mem::take(&mut *d))
                    .unwrap_or_default();
                outcome.trees.push(SeedTree {
                    seed: seed.clone(),
                    tree,
                    dropped,
                });
            }
            Err(e) => {
                warn!("Failed to crawl {}: {}", seed, e);
                if let Ok(mut d) = dropped.lock() {
                    d.clear();
                }
                if let Some(ref callback) = progress_callback {
                    callback(format!("[!]  Failed to crawl {}: {}", seed, e));
                }
                outcome.failures.push(SeedFailure {
                    seed: seed.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if let Some(ref pb) = progress_bar {
        let total = fetched_count.load(Ordering::Relaxed);
        pb.finish_with_message(format!("Crawl complete! {} pages fetched", total));
    }

    Ok(outcome)
}

/// Short per-seed summary printed once crawling finishes.
pub fn generate_crawl_summary(outcome: &CrawlOutcome) -> String {
    let mut summary = String::new();
    summary.push_str("# Summary:\n");
    summary.push_str(&format!("  Seeds crawled: {}\n", outcome.trees.len()));
    summary.push_str(&format!("  Seeds failed: {}\n", outcome.failures.len()));

    for seed_tree in &outcome.trees {
        let root = seed_tree.tree.root();
        summary.push_str(&format!(
            "  {}: {} pages, {} unique links, {} dropped\n",
            seed_tree.seed,
            seed_tree.tree.len(),
            root.aggregated_urls.len(),
            seed_tree.dropped.len()
        ));
    }

    for failure in &outcome.failures {
        summary.push_str(&format!("  {}: failed ({})\n", failure.seed, failure.reason));
    }

    summary
}
