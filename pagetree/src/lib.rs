pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    crawl_options_from_args, expand_output_path, load_urls_from_file, load_urls_from_source,
    parse_url_line,
};

// Re-export crawl functionality from pagetree-core
pub use pagetree_core::crawl::{
    CrawlOptions, CrawlOutcome, CrawlProgressCallback, execute_crawl, extract_url_path,
    generate_crawl_summary,
};
