use sitemapper::commands::command_argument_builder;
use sitemapper::handlers::*;
use sitemapper_core::report::{ReportFormat, generate_report, save_report};
use sitemapper_core::service::SitemapResponse;
use std::time::Duration;
use tempfile::TempDir;

fn map_args(argv: &[&str]) -> MapArgs {
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .expect("arguments should parse");
    let quiet = matches.get_flag("quiet");
    let (_, sub_matches) = matches.subcommand().expect("map subcommand");
    MapArgs::from_matches(sub_matches, quiet).unwrap()
}

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("example.com");
    assert_eq!(result, Some("https://example.com".to_string()));
}

#[test]
fn test_parse_url_line_host_with_port() {
    let result = parse_url_line("localhost:8080");
    assert_eq!(result, Some("https://localhost:8080".to_string()));
}

#[test]
fn test_parse_url_line_invalid() {
    assert_eq!(parse_url_line("not a valid url!!!"), None);
    assert_eq!(parse_url_line(""), None);
}

#[test]
fn test_extract_url_path() {
    assert_eq!(
        sitemapper::extract_url_path("https://example.com/blog/post"),
        "/blog/post"
    );
    assert_eq!(sitemapper::extract_url_path("https://example.com"), "/");
}

#[test]
fn test_map_args_defaults() {
    let args = map_args(&["sitemapper", "map", "-u", "example.com"]);

    assert_eq!(args.url, "https://example.com");
    assert_eq!(args.depth, None);
    assert!(args.explore);
    assert!(!args.debug);
    assert!(!args.offline);
    assert_eq!(args.format, ReportFormat::Text);
    assert_eq!(args.verbose, 0);
    assert!(!args.quiet);
}

#[test]
fn test_map_args_all_flags() {
    let args = map_args(&[
        "sitemapper", "-q", "map", "-u", "https://acme.test", "-d", "3", "--no-explore", "--debug",
        "--offline", "--reader", "--timeout", "5", "--budget", "20", "-f", "json", "-o",
        "~/map.json", "-vv",
    ]);

    assert!(args.quiet);
    assert_eq!(args.depth, Some(3));
    assert!(!args.explore);
    assert!(args.debug && args.offline && args.reader);
    assert_eq!(args.timeout, Some(5));
    assert_eq!(args.budget, Some(20));
    assert_eq!(args.format, ReportFormat::Json);
    assert_eq!(args.output.as_deref(), Some("~/map.json"));
    assert_eq!(args.verbose, 2);

    let request = args.request();
    assert_eq!(request.depth, Some(3));
    assert!(!request.explore);
    assert!(request.debug);
}

#[test]
fn test_map_requires_url() {
    let result = command_argument_builder().try_get_matches_from(["sitemapper", "map"]);
    assert!(result.is_err());
}

#[test]
fn test_unknown_format_rejected() {
    let result =
        command_argument_builder().try_get_matches_from(["sitemapper", "map", "-u", "a.test", "-f", "csv"]);
    assert!(result.is_err());
}

#[test]
fn test_build_config_applies_overrides() {
    let args = map_args(&["sitemapper", "map", "-u", "a.test", "--timeout", "0", "--budget", "12"]);
    let config = build_config(&args);

    assert_eq!(config.fetch_timeout, Duration::from_secs(1));
    assert_eq!(config.crawl_budget, Duration::from_secs(12));
}

#[test]
fn test_offline_flag_forces_offline() {
    let args = map_args(&["sitemapper", "map", "-u", "a.test", "--offline"]);
    let mut config = build_config(&args);
    config.llm.api_key = Some("sk-test".to_string());

    assert!(runs_offline(&args, &config));
}

#[test]
fn test_missing_key_runs_offline() {
    let args = map_args(&["sitemapper", "map", "-u", "a.test"]);
    let mut config = build_config(&args);
    config.llm.api_key = None;

    assert!(runs_offline(&args, &config));
    assert!(build_service(&args, config).is_ok());
}

#[test]
fn test_resolve_output_path_plain() {
    let path = resolve_output_path("reports/map.md").unwrap();
    assert_eq!(path.to_str(), Some("reports/map.md"));
}

#[test]
fn test_report_written_to_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("map.md");
    let response = SitemapResponse {
        sitemap: "Acme (Homepage)\n\tAbout\n\t\tTeam".to_string(),
        title: "Acme".to_string(),
        url: "https://acme.test".to_string(),
        pages_explored: 2,
        description: Some("A design studio.".to_string()),
        links_to_explore: None,
        debug_info: None,
        error: None,
    };

    let report = generate_report(&response, ReportFormat::Markdown)?;
    save_report(&report, &path)?;

    let written = std::fs::read_to_string(&path)?;
    assert!(written.starts_with("# Sitemap: Acme"));
    assert!(written.contains("- Acme (Homepage)\n  - About\n    - Team\n"));
    Ok(())
}

#[test]
fn test_json_report_on_stdout_is_only_json() -> Result<(), Box<dyn std::error::Error>> {
    let response = SitemapResponse {
        sitemap: "Acme (Homepage)\n\tAbout".to_string(),
        title: "Acme".to_string(),
        url: "https://acme.test".to_string(),
        pages_explored: 2,
        description: None,
        links_to_explore: None,
        debug_info: None,
        error: None,
    };

    let report = generate_report(&response, ReportFormat::Json)?;
    let mut stdout = Vec::new();
    write_report(&report, &mut stdout)?;

    let parsed: serde_json::Value = serde_json::from_slice(&stdout)?;
    assert_eq!(parsed["title"], "Acme");
    assert_eq!(parsed["pagesExplored"], 2);
    Ok(())
}
