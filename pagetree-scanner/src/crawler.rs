use crate::error::{Result, ScanError};
use crate::extract::{Extractor, HtmlExtractor};
use crate::fetch::{Fetcher, HttpFetcher, require_ok};
use crate::normalize::normalize_links;
use crate::rank::RankProvider;
use crate::tree::{NodeId, PageNode, PageTree};
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Stages a single node passes through while it is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Fetching,
    Parsing,
    NormalizingLinks,
    RankLookup,
    ExpandingChildren,
    Complete,
    Failed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeState::Fetching => "fetching",
            NodeState::Parsing => "parsing",
            NodeState::NormalizingLinks => "normalizing links",
            NodeState::RankLookup => "rank lookup",
            NodeState::ExpandingChildren => "expanding children",
            NodeState::Complete => "complete",
            NodeState::Failed => "failed",
        };
        f.write_str(label)
    }
}

pub type ProgressCallback = Arc<dyn Fn(NodeState, String) + Send + Sync>;
pub type DropCallback = Arc<dyn Fn(String, &ScanError) + Send + Sync>;

/// Result of one child build attempt.
enum BranchOutcome {
    Kept(PageNode),
    Dropped { url: String, reason: ScanError },
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    ranker: Option<Arc<dyn RankProvider>>,
    workers: usize,
    max_pages: Option<usize>,
    strict_rank: bool,
    progress_callback: Option<ProgressCallback>,
    drop_callback: Option<DropCallback>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn Extractor>) -> Self {
        Self {
            fetcher,
            extractor,
            ranker: None,
            workers: 1,
            max_pages: None,
            strict_rank: false,
            progress_callback: None,
            drop_callback: None,
        }
    }

    /// HTTP fetcher and HTML extractor with the given request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpFetcher::with_timeout(timeout_secs)?),
            Arc::new(HtmlExtractor::new()),
        ))
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn RankProvider>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Sibling builds allowed in flight at once. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Upper bound on fetches started for one tree, root included.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Fail the node instead of leaving `rank` empty when lookup fails.
    pub fn with_strict_rank(mut self, strict: bool) -> Self {
        self.strict_rank = strict;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_drop_callback(mut self, callback: DropCallback) -> Self {
        self.drop_callback = Some(callback);
        self
    }

    /// Builds the tree rooted at `url`, expanding `depth_budget` levels.
    ///
    /// Only a failure of the root itself is returned; failed descendants are
    /// left out of their parent's `children`.
    pub async fn build(&self, url: &str, depth_budget: usize) -> Result<PageTree> {
        info!(
            "Building page tree for {} (depth {}, {} workers)",
            url, depth_budget, self.workers
        );

        let root = self.build_node(url, depth_budget).await?;
        let mut tree = PageTree::with_root(root);
        let mut pages_started = 1;
        let mut failed = 0;
        let mut skipped = 0;
        let mut frontier = vec![tree.root_id()];

        while !frontier.is_empty() {
            let mut jobs: Vec<(NodeId, String, usize)> = Vec::new();
            for &parent in &frontier {
                let Some(node) = tree.get(parent) else { continue };
                if node.depth_budget == 0 {
                    continue;
                }
                self.report(NodeState::ExpandingChildren, &node.url);
                let child_budget = node.depth_budget - 1;
                jobs.extend(
                    node.outbound_urls
                        .iter()
                        .map(|child| (parent, child.clone(), child_budget)),
                );
            }

            if let Some(max_pages) = self.max_pages {
                let remaining = max_pages.saturating_sub(pages_started);
                if jobs.len() > remaining {
                    debug!(
                        "Page budget of {} reached, skipping {} builds",
                        max_pages,
                        jobs.len() - remaining
                    );
                    skipped += jobs.len() - remaining;
                    jobs.truncate(remaining);
                }
            }
            pages_started += jobs.len();

            // `buffered` yields in job order, so children keep outbound order.
            let outcomes: Vec<(NodeId, BranchOutcome)> = stream::iter(jobs)
                .map(|(parent, child_url, budget)| async move {
                    let outcome = match self.build_node(&child_url, budget).await {
                        Ok(node) => BranchOutcome::Kept(node),
                        Err(reason) => BranchOutcome::Dropped {
                            url: child_url,
                            reason,
                        },
                    };
                    (parent, outcome)
                })
                .buffered(self.workers)
                .collect()
                .await;

            let mut next = Vec::new();
            for (parent, outcome) in outcomes {
                match outcome {
                    BranchOutcome::Kept(node) => next.push(tree.push_child(parent, node)),
                    BranchOutcome::Dropped { url, reason } => {
                        debug!("Dropping branch {}: {}", url, reason);
                        failed += 1;
                        if let Some(ref callback) = self.drop_callback {
                            callback(url, &reason);
                        }
                    }
                }
            }

            for &done in &frontier {
                if let Some(node) = tree.get(done) {
                    self.report(NodeState::Complete, &node.url);
                }
            }
            frontier = next;
        }

        tree.aggregate();
        info!(
            "Page tree for {} complete: {} nodes, {} failed branches, {} skipped by page budget",
            url,
            tree.len(),
            failed,
            skipped
        );
        Ok(tree)
    }

    async fn build_node(&self, url: &str, depth_budget: usize) -> Result<PageNode> {
        let result = self.fetch_and_parse(url, depth_budget).await;
        if result.is_err() {
            self.report(NodeState::Failed, url);
        }
        result
    }

    async fn fetch_and_parse(&self, url: &str, depth_budget: usize) -> Result<PageNode> {
        self.report(NodeState::Fetching, url);
        let base =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;
        let response = require_ok(url, self.fetcher.fetch(url).await?)?;

        self.report(NodeState::Parsing, url);
        let metadata = self
            .extractor
            .extract(&response.body)
            .map_err(|e| match e {
                ScanError::Extraction { reason, .. } => ScanError::Extraction {
                    url: url.to_string(),
                    reason,
                },
                other => other,
            })?;

        self.report(NodeState::NormalizingLinks, url);
        let outbound_urls = normalize_links(&base, &metadata.raw_hrefs);
        debug!("Found {} outbound links on {}", outbound_urls.len(), url);

        self.report(NodeState::RankLookup, url);
        let rank = self.lookup_rank(url).await?;

        Ok(PageNode {
            url: url.to_string(),
            depth_budget,
            raw_html: response.body,
            title: metadata.title,
            description: metadata.description,
            keywords: metadata.keywords,
            outbound_urls,
            children: Vec::new(),
            rank,
            aggregated_urls: Vec::new(),
        })
    }

    async fn lookup_rank(&self, url: &str) -> Result<Option<f64>> {
        let Some(ref ranker) = self.ranker else {
            return Ok(None);
        };
        match ranker.rank(url).await {
            Ok(rank) => Ok(Some(rank)),
            Err(e) if self.strict_rank => Err(e),
            Err(e) => {
                warn!("Rank lookup failed for {}: {}", url, e);
                Ok(None)
            }
        }
    }

    fn report(&self, state: NodeState, url: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(state, url.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::rank::StaticRank;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    /// In-memory site: url -> (status, body, delay in ms).
    #[derive(Default)]
    struct FakeWeb {
        pages: HashMap<String, (u16, String, u64)>,
        requests: StdMutex<Vec<String>>,
    }

    impl FakeWeb {
        fn page(mut self, url: &str, links: &[&str]) -> Self {
            let anchors: String = links
                .iter()
                .map(|href| format!(r#"<a href="{}">x</a>"#, href))
                .collect();
            let body = format!(
                "<html><head><title>{}</title></head><body>{}</body></html>",
                url, anchors
            );
            self.pages.insert(url.to_string(), (200, body, 0));
            self
        }

        fn status(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(url.to_string(), (status, String::new(), 0));
            self
        }

        fn raw(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), (200, body.to_string(), 0));
            self
        }

        fn delay(mut self, url: &str, millis: u64) -> Self {
            if let Some(entry) = self.pages.get_mut(url) {
                entry.2 = millis;
            }
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeWeb {
        async fn fetch(&self, url: &str) -> Result<FetchResponse> {
            self.requests.lock().unwrap().push(url.to_string());
            let Some((status, body, delay)) = self.pages.get(url).cloned() else {
                return Err(ScanError::Transport(format!("no route to {}", url)));
            };
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Ok(FetchResponse::new(status, body))
        }
    }

    struct FailingRank;

    #[async_trait]
    impl RankProvider for FailingRank {
        async fn rank(&self, url: &str) -> Result<f64> {
            Err(ScanError::Lookup {
                url: url.to_string(),
                reason: "service down".to_string(),
            })
        }
    }

    fn crawler(web: &Arc<FakeWeb>) -> Crawler {
        Crawler::new(web.clone(), Arc::new(HtmlExtractor::new()))
    }

    fn child_urls(tree: &PageTree, id: NodeId) -> Vec<String> {
        tree.children(id).map(|n| n.url.clone()).collect()
    }

    const S: &str = "http://site.test/";
    const L1: &str = "http://site.test/l1";
    const L2: &str = "http://site.test/l2";

    #[tokio::test]
    async fn test_end_to_end_drops_missing_child() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/l1", "/l2"])
                .page(L1, &["/deep"])
                .status(L2, 404),
        );

        let tree = crawler(&web).build(S, 1).await.unwrap();
        let root = tree.root();

        assert_eq!(root.outbound_urls, vec![L1, L2]);
        assert_eq!(child_urls(&tree, tree.root_id()), vec![L1]);

        let l1 = tree.children(tree.root_id()).next().unwrap();
        assert_eq!(l1.depth_budget, 0);
        assert!(l1.children.is_empty());
        assert_eq!(l1.outbound_urls, vec!["http://site.test/deep"]);

        assert_eq!(
            root.aggregated_urls,
            vec![L1, L2, "http://site.test/deep"]
        );
        assert!(!web.requests().contains(&"http://site.test/deep".to_string()));
    }

    #[tokio::test]
    async fn test_leaf_only_fetches_itself() {
        let web = Arc::new(FakeWeb::default().page(S, &["/l1", "/l2"]).page(L1, &[]));

        let tree = crawler(&web).build(S, 0).await.unwrap();

        assert_eq!(web.requests(), vec![S]);
        assert!(tree.root().children.is_empty());
        assert_eq!(tree.root().aggregated_urls, tree.root().outbound_urls);
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn test_root_failure_is_returned() {
        let web = Arc::new(FakeWeb::default().status(S, 500));

        let err = crawler(&web).build(S, 3).await.unwrap_err();

        assert!(matches!(err, ScanError::Status { status: 500, ref url } if url == S));
    }

    #[tokio::test]
    async fn test_invalid_root_url() {
        let web = Arc::new(FakeWeb::default());

        let err = crawler(&web).build("not a url", 1).await.unwrap_err();

        assert!(matches!(err, ScanError::InvalidUrl(_)));
        assert!(web.requests().is_empty());
    }

    #[tokio::test]
    async fn test_deep_failures_do_not_leak() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/a"])
                .page("http://site.test/a", &["/b", "/missing"])
                .page("http://site.test/b", &[]),
        );

        let tree = crawler(&web).build(S, 2).await.unwrap();

        let a = tree.children(tree.root_id()).next().unwrap();
        assert_eq!(a.outbound_urls.len(), 2);
        assert_eq!(a.children.len(), 1);
        assert_eq!(tree.len(), 3);
    }

    #[tokio::test]
    async fn test_extraction_failure_drops_branch() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/broken", "/l1"])
                .raw("http://site.test/broken", r#"<meta name="description">"#)
                .page(L1, &[]),
        );
        let dropped = Arc::new(StdMutex::new(Vec::new()));
        let dropped_clone = dropped.clone();

        let tree = crawler(&web)
            .with_drop_callback(Arc::new(move |url: String, reason: &ScanError| {
                dropped_clone
                    .lock()
                    .unwrap()
                    .push((url, matches!(reason, ScanError::Extraction { .. })));
            }))
            .build(S, 1)
            .await
            .unwrap();

        assert_eq!(child_urls(&tree, tree.root_id()), vec![L1]);
        assert_eq!(
            *dropped.lock().unwrap(),
            vec![("http://site.test/broken".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_depth_budget_decreases_per_level() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/1"])
                .page("http://site.test/1", &["/2"])
                .page("http://site.test/2", &["/3"])
                .page("http://site.test/3", &["/4"]),
        );

        let tree = crawler(&web).build(S, 3).await.unwrap();

        for (level, node) in tree.depth_first() {
            assert_eq!(node.depth_budget, 3 - level);
        }
        assert_eq!(tree.len(), 4);
        assert!(!web.requests().contains(&"http://site.test/4".to_string()));
    }

    #[tokio::test]
    async fn test_cycles_produce_repeated_nodes() {
        let a = "http://site.test/a";
        let web = Arc::new(FakeWeb::default().page(S, &["/a"]).page(a, &["/"]));

        let tree = crawler(&web).build(S, 3).await.unwrap();

        let urls: Vec<&str> = tree.depth_first().map(|(_, n)| n.url.as_str()).collect();
        assert_eq!(urls, vec![S, a, S, a]);
        assert_eq!(web.requests().iter().filter(|u| *u == S).count(), 2);
    }

    #[tokio::test]
    async fn test_parallel_children_keep_outbound_order() {
        let links = ["/c1", "/c2", "/c3", "/c4"];
        let mut web = FakeWeb::default().page(S, &links);
        for (i, link) in links.iter().enumerate() {
            let url = format!("http://site.test{}", link);
            web = web
                .page(&url, &[])
                .delay(&url, 40 - (i as u64) * 10);
        }
        let web = Arc::new(web);

        let tree = crawler(&web).with_workers(4).build(S, 1).await.unwrap();

        assert_eq!(child_urls(&tree, tree.root_id()), tree.root().outbound_urls);
    }

    #[tokio::test]
    async fn test_max_pages_stops_new_builds() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/l1", "/l2"])
                .page(L1, &["/x"])
                .page(L2, &[]),
        );

        let tree = crawler(&web).with_max_pages(2).build(S, 2).await.unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(web.requests(), vec![S, L1]);
    }

    #[tokio::test]
    async fn test_budget_skips_are_not_reported_as_drops() {
        let web = Arc::new(
            FakeWeb::default()
                .page(S, &["/l1", "/l2", "/gone"])
                .page(L1, &[])
                .page(L2, &[]),
        );
        let drops = Arc::new(StdMutex::new(Vec::new()));
        let drops_clone = drops.clone();

        let tree = crawler(&web)
            .with_max_pages(2)
            .with_drop_callback(Arc::new(move |url: String, _reason: &ScanError| {
                drops_clone.lock().unwrap().push(url);
            }))
            .build(S, 1)
            .await
            .unwrap();

        assert_eq!(tree.len(), 2);
        assert!(drops.lock().unwrap().is_empty());
        assert_eq!(tree.unexpanded_count(), 2);
    }

    #[tokio::test]
    async fn test_rank_failure_leaves_rank_empty() {
        let web = Arc::new(FakeWeb::default().page(S, &[]));

        let tree = crawler(&web)
            .with_ranker(Arc::new(FailingRank))
            .build(S, 0)
            .await
            .unwrap();

        assert_eq!(tree.root().rank, None);
    }

    #[tokio::test]
    async fn test_strict_rank_failure_fails_node() {
        let web = Arc::new(FakeWeb::default().page(S, &[]));

        let err = crawler(&web)
            .with_ranker(Arc::new(FailingRank))
            .with_strict_rank(true)
            .build(S, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::Lookup { .. }));
    }

    #[tokio::test]
    async fn test_rank_is_recorded() {
        let web = Arc::new(FakeWeb::default().page(S, &["/l1"]).page(L1, &[]));

        let tree = crawler(&web)
            .with_ranker(Arc::new(StaticRank(4.2)))
            .build(S, 1)
            .await
            .unwrap();

        assert!(tree.iter().all(|n| n.rank == Some(4.2)));
    }

    #[tokio::test]
    async fn test_progress_states_in_order() {
        let web = Arc::new(FakeWeb::default().page(S, &[]));
        let states = Arc::new(StdMutex::new(Vec::new()));
        let states_clone = states.clone();

        crawler(&web)
            .with_progress_callback(Arc::new(move |state: NodeState, _url: String| {
                states_clone.lock().unwrap().push(state);
            }))
            .build(S, 0)
            .await
            .unwrap();

        assert_eq!(
            *states.lock().unwrap(),
            vec![
                NodeState::Fetching,
                NodeState::Parsing,
                NodeState::NormalizingLinks,
                NodeState::RankLookup,
                NodeState::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_build_over_http() {
        let mock_server = MockServer::start().await;

        let root_html = r##"<html><head>
                <title>Home</title>
                <meta name="description" content="The home page">
                <meta name="keywords" content="home, start">
            </head><body>
                <a href="/page1">Page 1</a>
                <a href="#top">Top</a>
                <a href="/missing">Missing</a>
                <a href="/page1">Page 1 again</a>
            </body></html>"##;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(root_html),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/page1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body><a href='/'>home</a></body></html>"),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let base = format!("{}/", mock_server.uri());
        let crawler = Crawler::with_timeout(5).unwrap().with_workers(2);
        let tree = crawler.build(&base, 1).await.unwrap();
        let root = tree.root();

        assert_eq!(root.title.as_deref(), Some("Home"));
        assert_eq!(root.description.as_deref(), Some("The home page"));
        assert_eq!(
            root.keywords,
            Some(vec!["home".to_string(), "start".to_string()])
        );
        assert_eq!(
            root.outbound_urls,
            vec![format!("{}page1", base), format!("{}missing", base)]
        );
        assert_eq!(tree.len(), 2);
        assert_eq!(root.aggregated_urls.len(), 3);
    }
}
