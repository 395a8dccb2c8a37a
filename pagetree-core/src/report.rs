// Report generation from crawl results

use crate::crawl::{CrawlOutcome, DroppedBranch, SeedFailure, SeedTree};
use chrono::Utc;
use pagetree_scanner::{PageNode, PageTree};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportData<'a> {
    pub generated_at: String,
    pub seeds: Vec<SeedReport<'a>>,
    pub failures: &'a [SeedFailure],
}

#[derive(Debug, Serialize)]
pub struct SeedReport<'a> {
    pub seed: &'a str,
    pub total_nodes: usize,
    pub unique_urls: usize,
    pub dropped: &'a [DroppedBranch],
    pub tree: &'a PageTree,
}

impl<'a> ReportData<'a> {
    pub fn from_outcome(outcome: &'a CrawlOutcome) -> Self {
        let seeds = outcome
            .trees
            .iter()
            .map(|seed_tree| SeedReport {
                seed: &seed_tree.seed,
                total_nodes: seed_tree.tree.len(),
                unique_urls: seed_tree.tree.root().aggregated_urls.len(),
                dropped: &seed_tree.dropped,
                tree: &seed_tree.tree,
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            seeds,
            failures: &outcome.failures,
        }
    }
}

pub fn render_report(outcome: &CrawlOutcome, format: ReportFormat) -> serde_json::Result<String> {
    match format {
        ReportFormat::Text => Ok(render_text(outcome)),
        ReportFormat::Json => serde_json::to_string_pretty(&ReportData::from_outcome(outcome)),
        ReportFormat::Markdown => Ok(render_markdown(outcome)),
    }
}

pub fn save_report(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn node_label(node: &PageNode) -> String {
    let mut label = node.url.clone();
    if let Some(rank) = node.rank {
        label.push_str(&format!(" [rank {:.2}]", rank));
    }
    if let Some(ref title) = node.title {
        let title = title.trim();
        if !title.is_empty() {
            label.push_str(&format!(" \"{}\"", title));
        }
    }
    label
}

fn render_text(outcome: &CrawlOutcome) -> String {
    let mut report = String::new();

    for seed_tree in &outcome.trees {
        let SeedTree { seed, tree, dropped } = seed_tree;
        report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
        report.push_str(&format!("## {}\n", seed));
        report.push_str(&format!(
            "  {} pages, {} unique links, {} dropped branches\n\n",
            tree.len(),
            tree.root().aggregated_urls.len(),
            dropped.len()
        ));

        for (level, node) in tree.depth_first() {
            report.push_str(&"  ".repeat(level + 1));
            report.push_str(&node_label(node));
            report.push('\n');
        }

        if !dropped.is_empty() {
            report.push_str("\n  Dropped branches:\n");
            for branch in dropped {
                report.push_str(&format!("    {} ({})\n", branch.url, branch.reason));
            }
        }
        report.push('\n');
    }

    if !outcome.failures.is_empty() {
        report.push_str("Seeds that could not be crawled:\n");
        for failure in &outcome.failures {
            report.push_str(&format!("  {}: {}\n", failure.seed, failure.reason));
        }
    }

    report
}

fn escape_markdown(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}

fn render_markdown(outcome: &CrawlOutcome) -> String {
    let mut report = String::new();
    report.push_str("# Page tree report\n\n");

    for seed_tree in &outcome.trees {
        report.push_str(&format!("## {}\n\n", seed_tree.seed));

        for (level, node) in seed_tree.tree.depth_first() {
            let text = node
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(&node.url);
            report.push_str(&"  ".repeat(level));
            report.push_str(&format!("- [{}]({})", escape_markdown(text), node.url));
            if let Some(rank) = node.rank {
                report.push_str(&format!(" (rank {:.2})", rank));
            }
            report.push('\n');
        }
        report.push('\n');

        if !seed_tree.dropped.is_empty() {
            report.push_str("| Dropped URL | Reason |\n|---|---|\n");
            for branch in &seed_tree.dropped {
                report.push_str(&format!("| {} | {} |\n", branch.url, branch.reason));
            }
            report.push('\n');
        }
    }

    if !outcome.failures.is_empty() {
        report.push_str("## Failed seeds\n\n");
        for failure in &outcome.failures {
            report.push_str(&format!("- {}: {}\n", failure.seed, failure.reason));
        }
    }

    report
}
