pub mod crawl;
pub mod report;

use colored::Colorize;

/// Writes the banner to stderr; stdout is reserved for reports.
pub fn print_banner() {
    eprintln!(
        "{} {}",
        "pagetree".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    eprintln!("{}", "depth-bounded page tree crawler".bright_black());
    eprintln!();
}
