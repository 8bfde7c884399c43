use std::path::Path;

use colored::Colorize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::badge::BadgeColor;
use crate::github::PullRequest;
use crate::scheduler::Snapshot;

const UNCONFIGURED_HINT: &str = "No configuration found. Run `pr-badge configure --token <TOKEN>`.";
const EMPTY_HINT: &str = "No open pull requests.";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Show a snapshot on the terminal (default) or write it as markdown.
#[instrument(skip(snapshot), fields(badge = %snapshot.badge.text))]
pub fn output(snapshot: &Snapshot, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing pull requests to terminal");
            print!("{}", render_terminal(snapshot));
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing pull requests to file");
            std::fs::write(path, render_markdown(snapshot))?;
            Ok(())
        }
    }
}

/// Popup view: badge line, then pull requests grouped by repository.
///
/// ```text
/// Badge: 3 (green)
///
/// repoA
///   #12 Fix login (by alice, 3 days ago)
/// ```
pub fn render_terminal(snapshot: &Snapshot) -> String {
    let badge = &snapshot.badge;
    let aggregation = &snapshot.aggregation;
    let mut out = String::new();

    let text = if badge.text.is_empty() { "0" } else { badge.text.as_str() };
    out.push_str(&format!("Badge: {} ({})\n\n", colorize(text, badge.color), badge.color));

    if !aggregation.configured {
        out.push_str(&format!("{}\n", UNCONFIGURED_HINT.yellow()));
        return out;
    }
    if let Some(error) = &aggregation.error {
        out.push_str(&format!("{}\n", error.red()));
        return out;
    }
    if aggregation.grouped.is_empty() {
        out.push_str(EMPTY_HINT);
        out.push('\n');
        return out;
    }

    for group in aggregation.grouped.iter() {
        out.push_str(&format!("{}\n", group.repository.bold()));
        for pr in &group.pull_requests {
            out.push_str(&format!("  {} {} {}", pr.number.cyan(), pr.title, attribution(pr).dimmed()));
            if pr.draft {
                out.push_str(&format!(" {}", "[draft]".yellow()));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

pub fn render_markdown(snapshot: &Snapshot) -> String {
    let aggregation = &snapshot.aggregation;
    let mut md = String::new();

    md.push_str("# Pull requests\n\n");
    md.push_str(&format!(
        "**Badge:** `{}` ({})\n\n",
        if snapshot.badge.text.is_empty() { "0" } else { snapshot.badge.text.as_str() },
        snapshot.badge.color
    ));

    if !aggregation.configured {
        md.push_str(UNCONFIGURED_HINT);
        md.push('\n');
        return md;
    }
    if let Some(error) = &aggregation.error {
        md.push_str(&format!("**Error:** {}\n", error));
        return md;
    }
    if aggregation.grouped.is_empty() {
        md.push_str(EMPTY_HINT);
        md.push('\n');
        return md;
    }

    for group in aggregation.grouped.iter() {
        md.push_str(&format!("## {}\n\n", group.repository));
        for pr in &group.pull_requests {
            let draft = if pr.draft { " *(draft)*" } else { "" };
            md.push_str(&format!("- [{} {}]({}) {}{}\n", pr.number, pr.title, pr.url, attribution(pr), draft));
        }
        md.push('\n');
    }
    md
}

fn attribution(pr: &PullRequest) -> String {
    format!("(by {}, {})", pr.opened_by.name, pr.created_at)
}

fn colorize(text: &str, color: BadgeColor) -> colored::ColoredString {
    match color {
        BadgeColor::Green => text.green().bold(),
        BadgeColor::Orange => text.yellow().bold(),
        BadgeColor::Red => text.red().bold(),
        BadgeColor::Gray => text.bright_black().bold(),
    }
}
