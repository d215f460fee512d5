use crate::CLAP_STYLING;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitemapper")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitemapper")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("map")
                .about(
                    "Crawl outward from a URL for a bounded number of hops and synthesize a \
                hierarchical sitemap of the site.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The site to map (scheme optional, https is assumed)"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Number of hops to fetch, counting the homepage as 1 (default: 2, max: 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"no-explore")
                        .required(false)
                        .help("Only fetch the homepage; do not follow any links")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"debug")
                        .required(false)
                        .help("Include crawl diagnostics in the report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"offline")
                        .required(false)
                        .help("Use deterministic link selection and path-based synthesis instead of a language model")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"reader")
                        .required(false)
                        .help("Fetch pages through the reader API instead of scraping HTML directly")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-page fetch timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"budget" <SECONDS>)
                        .required(false)
                        .help("Overall crawl budget in seconds; partial results are kept when it runs out")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown, tree")
                        .value_parser(["text", "json", "markdown", "tree"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Log crawl activity to stderr (repeat for more detail)")
                        .action(clap::ArgAction::Count),
                ),
        )
}
