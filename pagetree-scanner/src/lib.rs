pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod rank;
pub mod tree;

pub use crawler::{Crawler, DropCallback, NodeState, ProgressCallback};
pub use error::ScanError;
pub use extract::{Extractor, HtmlExtractor, PageMetadata};
pub use fetch::{CachedFetcher, FetchResponse, Fetcher, HttpFetcher};
pub use rank::{OpenPageRank, RankProvider, StaticRank};
pub use tree::{NodeId, PageNode, PageTree};
