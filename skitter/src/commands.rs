use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("skitter")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("skitter")
        .styles(CLAP_STYLING)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a site breadth-first from a seed URL, staying on the seed's \
                domain, and save what it finds.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("The seed URL to start crawling from"),
                )
                .arg(
                    arg!(-d --"delay" <SECONDS>)
                        .required(false)
                        .help("Seconds to pause between page fetches")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("1.0"),
                )
                .arg(
                    arg!(-m --"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to crawl, failed fetches included")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(-f --"formats" <FORMAT>)
                        .required(false)
                        .help("Output formats for the crawl artifacts")
                        .value_parser(["json", "csv", "xlsx", "excel"])
                        .num_args(1..)
                        .default_value("json"),
                )
                .arg(
                    arg!(-o --"output-dir" <PATH>)
                        .required(false)
                        .help("Directory to save crawl artifacts into")
                        .default_value("data"),
                )
                .arg(
                    arg!(-w --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("The number of async worker 'threads' in the worker pool.")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(-u --"user-agent" <STRING>)
                        .required(false)
                        .help("User-Agent header to send with every request"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"browser")
                        .required(false)
                        .help("Render pages in a headless browser instead of plain HTTP")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"wait-for" <SELECTOR>)
                        .required(false)
                        .help("CSS selector to wait for before capturing a rendered page")
                        .requires("browser"),
                )
                .arg(
                    arg!(--"no-headless")
                        .required(false)
                        .help("Show the browser window instead of running headless")
                        .action(clap::ArgAction::SetTrue)
                        .requires("browser"),
                )
                .arg(
                    arg!(-q --"quiet" "Suppress progress output and the settings banner")
                        .required(false),
                ),
        )
}
