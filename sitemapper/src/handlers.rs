use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitemapper_core::llm::{ChatClient, LlmLinkJudge, LlmSynthesizer};
use sitemapper_core::policy::LinkJudge;
use sitemapper_core::report::{ReportFormat, generate_report, save_report};
use sitemapper_core::synth::SitemapSynthesizer;
use sitemapper_core::{
    PathSynthesizer, SameSiteJudge, SitemapConfig, SitemapRequest, SitemapResponse, SitemapService,
};
use sitemapper_scanner::{HttpFetcher, PageFetcher, ReaderFetcher};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, warn};
use url::Url;

/// Everything the `map` subcommand was asked to do.
#[derive(Debug, Clone)]
pub struct MapArgs {
    pub url: String,
    pub depth: Option<usize>,
    pub explore: bool,
    pub debug: bool,
    pub offline: bool,
    pub reader: bool,
    pub timeout: Option<u64>,
    pub budget: Option<u64>,
    pub format: ReportFormat,
    pub output: Option<String>,
    pub verbose: u8,
    pub quiet: bool,
}

impl MapArgs {
    pub fn from_matches(sub_matches: &ArgMatches, quiet: bool) -> Result<Self> {
        let raw_url = sub_matches
            .get_one::<String>("url")
            .context("--url is required")?;
        let url = parse_url_line(raw_url.trim())
            .with_context(|| format!("'{}' is not a valid URL", raw_url))?;

        let format_name = sub_matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text");
        let format = ReportFormat::from_str(format_name)
            .with_context(|| format!("Unknown report format '{}'", format_name))?;

        Ok(Self {
            url,
            depth: sub_matches.get_one::<usize>("depth").copied(),
            explore: !sub_matches.get_flag("no-explore"),
            debug: sub_matches.get_flag("debug"),
            offline: sub_matches.get_flag("offline"),
            reader: sub_matches.get_flag("reader"),
            timeout: sub_matches.get_one::<u64>("timeout").copied(),
            budget: sub_matches.get_one::<u64>("budget").copied(),
            format,
            output: sub_matches.get_one::<String>("output").cloned(),
            verbose: sub_matches.get_count("verbose"),
            quiet,
        })
    }

    pub fn request(&self) -> SitemapRequest {
        SitemapRequest {
            url: self.url.clone(),
            depth: self.depth,
            debug: self.debug,
            explore: self.explore,
        }
    }
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if line.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some_and(|host| !host.is_empty()) => Some(with_scheme),
        _ => None,
    }
}

/// Write a rendered report as-is, so JSON output stays parseable.
pub fn write_report<W: Write>(report: &str, out: &mut W) -> std::io::Result<()> {
    out.write_all(report.as_bytes())?;
    out.flush()
}

/// Expand `~` and environment variables in an output path.
pub fn resolve_output_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Cannot expand path {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Environment configuration with command-line overrides applied on top.
pub fn build_config(args: &MapArgs) -> SitemapConfig {
    let mut config = SitemapConfig::from_env();
    if let Some(secs) = args.timeout {
        config.fetch_timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(secs) = args.budget {
        config.crawl_budget = Duration::from_secs(secs.max(1));
    }
    config
}

/// Whether link selection and synthesis run without a language model.
pub fn runs_offline(args: &MapArgs, config: &SitemapConfig) -> bool {
    args.offline || config.llm.api_key.is_none()
}

pub fn build_service(args: &MapArgs, config: SitemapConfig) -> Result<SitemapService> {
    let fetcher: Arc<dyn PageFetcher> = if args.reader {
        Arc::new(
            ReaderFetcher::with_timeout(
                config.reader.endpoint.clone(),
                config.reader.api_key.clone(),
                config.fetch_timeout,
            )
            .context("Failed to build reader client")?,
        )
    } else {
        Arc::new(HttpFetcher::with_timeout(config.fetch_timeout).context("Failed to build HTTP client")?)
    };

    let (judge, synthesizer): (Arc<dyn LinkJudge>, Arc<dyn SitemapSynthesizer>) = if runs_offline(args, &config) {
        if !args.offline {
            warn!("OPENAI_API_KEY is not set; falling back to offline link selection");
        }
        (Arc::new(SameSiteJudge), Arc::new(PathSynthesizer))
    } else {
        let chat = Arc::new(ChatClient::new(&config.llm).context("Failed to build model client")?);
        (
            Arc::new(LlmLinkJudge::new(chat.clone())),
            Arc::new(LlmSynthesizer::new(chat)),
        )
    };

    Ok(SitemapService::new(fetcher, judge, synthesizer, config))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Banner and status lines go to stderr so stdout carries only the report.
pub fn print_banner() {
    eprintln!(
        "{}",
        r#"
     _ _
 ___(_) |_ ___ _ __ ___   __ _ _ __  _ __   ___ _ __
/ __| | __/ _ \ '_ ` _ \ / _` | '_ \| '_ \ / _ \ '__|
\__ \ | ||  __/ | | | | | (_| | |_) | |_) |  __/ |
|___/_|\__\___|_| |_| |_|\__,_| .__/| .__/ \___|_|
                              |_|   |_|              "#
            .bright_cyan()
    );
    eprintln!(
        "  {} {}\n",
        "v".dimmed(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
}

fn print_summary(response: &SitemapResponse, offline: bool) {
    eprintln!();
    eprintln!("{} Mapped {}", "✓".green().bold(), response.url.bright_white());
    eprintln!(
        "  {} {}",
        "Pages explored:".blue(),
        response.pages_explored.to_string().cyan()
    );
    if let Some(ref queued) = response.links_to_explore {
        eprintln!("  {} {}", "Links followed:".blue(), queued.len().to_string().cyan());
    }
    eprintln!(
        "  {} {}",
        "Selection:".blue(),
        if offline { "offline (same-site order)" } else { "language model" }
    );
    if let Some(ref error) = response.error {
        eprintln!("{} {}", "⚠".yellow().bold(), error.yellow());
    }
    eprintln!();
}

pub async fn handle_map(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let args = MapArgs::from_matches(sub_matches, quiet)?;
    init_tracing(args.verbose);

    let config = build_config(&args);
    let offline = runs_offline(&args, &config);
    let depth = config.effective_depth(args.depth);

    if !args.quiet {
        eprintln!("{} {}", "Mapping".bright_white().bold(), args.url.bright_white());
        eprintln!("Depth: {}", if args.explore { depth } else { 1 });
        eprintln!("Budget: {}s\n", config.effective_crawl_budget().as_secs());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    if args.quiet {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    } else {
        spinner.enable_steady_tick(Duration::from_millis(100));
    }

    let progress_spinner = spinner.clone();
    let service = build_service(&args, config)?
        .with_progress_callback(Arc::new(move |msg: String| progress_spinner.set_message(msg)));

    let response = service.handle(args.request()).await;
    spinner.finish_and_clear();

    let report = generate_report(&response, args.format).context("Failed to render report")?;

    match args.output {
        Some(ref output) => {
            let path = resolve_output_path(output)?;
            save_report(&report, &path).with_context(|| format!("Failed to write {}", path.display()))?;
            if !args.quiet {
                print_summary(&response, offline);
                eprintln!("{} Report saved to {}", "✓".green().bold(), path.display().to_string().bright_white());
            }
        }
        None => {
            if !args.quiet && args.format == ReportFormat::Text {
                print_summary(&response, offline);
            }
            write_report(&report, &mut std::io::stdout().lock()).context("Failed to write report")?;
        }
    }

    Ok(())
}
