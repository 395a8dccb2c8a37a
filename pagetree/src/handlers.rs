use clap::ArgMatches;
use colored::Colorize;
use pagetree_core::crawl::{CrawlOptions, CrawlProgressCallback, execute_crawl, generate_crawl_summary};
use pagetree_core::report::{ReportFormat, render_report, save_report};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use url::Url;

// Helper functions for crawl handler

/// Load URLs from either a file or a single URL argument
pub fn load_urls_from_source(
    url: Option<&Url>,
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if let Some(url) = url {
        Ok(vec![url.as_str().to_string()])
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file, skipping blank lines and `#` comments
pub fn load_urls_from_file(path: &PathBuf) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && url.has_host()
    {
        return Some(url.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if let Ok(url) = Url::parse(&with_scheme) {
        return Some(url.to_string());
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Expands `~` in a user-supplied output path.
pub fn expand_output_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Collects crawl options from the `crawl` subcommand's arguments.
pub fn crawl_options_from_args(args: &ArgMatches, quiet: bool) -> Result<CrawlOptions, String> {
    let urls = load_urls_from_source(
        args.get_one::<Url>("url"),
        args.get_one::<PathBuf>("hosts-file"),
    )?;

    Ok(CrawlOptions {
        urls,
        depth: args.get_one::<usize>("depth").copied().unwrap_or(1),
        threads: args.get_one::<usize>("threads").copied().unwrap_or(4),
        max_pages: args.get_one::<usize>("max-pages").copied(),
        timeout_secs: args.get_one::<u64>("timeout").copied().unwrap_or(10),
        cache: args.get_flag("cache"),
        strict_rank: args.get_flag("strict-rank"),
        rank_api_key: args.get_one::<String>("rank-api-key").cloned(),
        rank_endpoint: args.get_one::<String>("rank-endpoint").cloned(),
        show_progress_bars: !quiet,
    })
}

fn write_output(report: &str, output: Option<&String>) -> Result<(), String> {
    match output {
        Some(raw) => {
            let path = expand_output_path(raw);
            save_report(Path::new(&path), report)
                .map_err(|e| format!("Failed to write report to {}: {}", path.display(), e))?;
            eprintln!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

/// Runs the `crawl` subcommand and returns the process exit code.
///
/// Only the report is written to stdout; status output goes to stderr.
pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> i32 {
    let options = match crawl_options_from_args(args, quiet) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            return 1;
        }
    };

    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    if !quiet {
        eprintln!("Seeds: {}", options.urls.len());
        eprintln!("Depth: {}", options.depth);
        eprintln!("Workers: {}", options.threads);
        if options.rank_api_key.is_none() {
            eprintln!("Rank: disabled (no API key)");
        }
        eprintln!();
    }

    info!("Starting crawl of {} seed(s)", options.urls.len());

    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| eprintln!("{}", msg)))
    };

    let outcome = match execute_crawl(options, progress_callback).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
            return 1;
        }
    };

    if !quiet {
        eprintln!("\n{} Crawl complete!\n", "✓".green().bold());
        eprintln!("{}", generate_crawl_summary(&outcome));
    }

    let report = match render_report(&outcome, format) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Failed to render report: {}", "✗".red().bold(), e);
            return 1;
        }
    };

    if let Err(e) = write_output(&report, args.get_one::<String>("output")) {
        eprintln!("{} {}", "✗".red().bold(), e);
        return 1;
    }

    if outcome.all_failed() { 1 } else { 0 }
}
