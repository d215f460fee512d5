// Report generation from a sitemap response

use crate::outline::{parse_outline, render_markdown, render_tree};
use crate::service::SitemapResponse;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
    Tree,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "tree" => Some(ReportFormat::Tree),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text | ReportFormat::Tree => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
        }
    }
}

pub fn generate_report(response: &SitemapResponse, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(response)),
        ReportFormat::Json => generate_json_report(response),
        ReportFormat::Markdown => Ok(generate_markdown_report(response)),
        ReportFormat::Tree => Ok(generate_tree_report(response)),
    }
}

pub fn generate_text_report(response: &SitemapResponse) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                              SITEMAP REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Site:           {}\n", response.title));
    report.push_str(&format!("URL:            {}\n", response.url));
    report.push_str(&format!("Pages Explored: {}\n", response.pages_explored));
    if let Some(ref debug) = response.debug_info {
        report.push_str(&format!("Crawl ID:       {}\n", debug.crawl_id));
        report.push_str(&format!("Started:        {}\n", debug.started_at));
        report.push_str(&format!("Duration:       {} ms\n", debug.duration_ms));
        report.push_str(&format!(
            "Depth:          {} of {}\n",
            debug.depth_reached, debug.effective_depth
        ));
    }
    if let Some(ref error) = response.error {
        report.push_str(&format!("Error:          {}\n", error));
    }
    report.push('\n');

    if let Some(ref description) = response.description {
        report.push_str(RULE);
        report.push_str("DESCRIPTION\n");
        report.push_str(RULE);
        report.push('\n');
        report.push_str(&wrap_text(description, 78, ""));
        report.push_str("\n\n");
    }

    report.push_str(RULE);
    report.push_str("SITE MAP\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(response.sitemap.trim_end());
    report.push_str("\n\n");

    if let Some(ref queued) = response.links_to_explore
        && !queued.is_empty()
    {
        report.push_str(RULE);
        report.push_str("LINKS EXPLORED\n");
        report.push_str(RULE);
        report.push('\n');
        for (idx, link) in queued.iter().enumerate() {
            report.push_str(&format!(
                "[{}] {} ({})\n",
                idx + 1,
                link.selection.text,
                link.selection.url
            ));
            report.push_str(&format!("    Found on: {}  Depth: {}\n", link.found_on, link.depth));
            if let Some(ref reason) = link.selection.reason {
                report.push_str(&wrap_text(reason, 74, "    "));
                report.push('\n');
            }
        }
        report.push('\n');
    }

    if let Some(ref debug) = response.debug_info
        && !debug.failures.is_empty()
    {
        report.push_str(RULE);
        report.push_str("FAILURES\n");
        report.push_str(RULE);
        report.push('\n');
        for failure in &debug.failures {
            report.push_str(&format!("  depth {}  {}  {}\n", failure.depth, failure.url, failure.error));
        }
        report.push('\n');
    }

    report
}

pub fn generate_json_report(response: &SitemapResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(response)
}

pub fn generate_markdown_report(response: &SitemapResponse) -> String {
    let mut report = String::new();

    report.push_str(&format!("# Sitemap: {}\n\n", response.title));
    report.push_str(&format!("**URL:** {}  \n", response.url));
    report.push_str(&format!("**Pages explored:** {}\n\n", response.pages_explored));

    if let Some(ref error) = response.error {
        report.push_str(&format!("> **Error:** {}\n\n", error));
    }

    if let Some(ref description) = response.description {
        report.push_str("## Description\n\n");
        report.push_str(description.trim());
        report.push_str("\n\n");
    }

    report.push_str("## Structure\n\n");
    match parse_outline(&response.sitemap) {
        Some(tree) => report.push_str(&render_markdown(&tree)),
        None => report.push_str("_No structure could be determined._\n"),
    }

    if let Some(ref queued) = response.links_to_explore
        && !queued.is_empty()
    {
        report.push_str("\n## Links Explored\n\n");
        report.push_str("| # | Link | Found on | Depth |\n");
        report.push_str("|---|------|----------|-------|\n");
        for (idx, link) in queued.iter().enumerate() {
            report.push_str(&format!(
                "| {} | [{}]({}) | {} | {} |\n",
                idx + 1,
                escape_table_cell(&link.selection.text),
                link.selection.url,
                link.found_on,
                link.depth
            ));
        }
    }

    report
}

pub fn generate_tree_report(response: &SitemapResponse) -> String {
    match parse_outline(&response.sitemap) {
        Some(tree) => render_tree(&tree),
        None => format!("{}\n", response.title),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn escape_table_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(format!("{}{}", indent, current));
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(format!("{}{}", indent, current));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text() {
        let wrapped = wrap_text("one two three four", 9, "  ");
        assert_eq!(wrapped, "  one two\n  three\n  four");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("MD"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::from_str("tree"), Some(ReportFormat::Tree));
        assert_eq!(ReportFormat::from_str("csv"), None);
    }
}
