use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("pagetree")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("pagetree")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about(
                    "Build a tree of pages from a seed URL, following every link down to the \
                given depth.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The seed URL to crawl")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of seed URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Link levels to follow below the seed (0 = seed page only)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Sibling pages fetched concurrently.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("4"),
                )
                .arg(
                    arg!(--"max-pages" <COUNT>)
                        .required(false)
                        .help("Stop starting new fetches once this many pages were requested per seed")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"cache")
                        .required(false)
                        .help("Fetch each distinct URL once and reuse the response")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"rank-api-key" <KEY>)
                        .required(false)
                        .help("Open PageRank API key; pages are unranked without one")
                        .env("OPR_API_KEY")
                        .hide_env_values(true),
                )
                .arg(
                    arg!(--"rank-endpoint" <URL>)
                        .required(false)
                        .help("Alternative Open PageRank API endpoint")
                        .requires("rank-api-key"),
                )
                .arg(
                    arg!(--"strict-rank")
                        .required(false)
                        .help("Treat a failed rank lookup as a failed page")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                ),
        )
}
