//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Severity bucket for a trust score
pub fn trust_level(trust_score: f64) -> &'static str {
    if trust_score >= 70.0 {
        "normal"
    } else if trust_score >= 40.0 {
        "suspicious"
    } else {
        "anomalous"
    }
}

/// Trust score with one decimal, colored by severity
pub fn color_trust(trust_score: f64) -> String {
    let formatted = format!("{:.1}", trust_score);
    match trust_level(trust_score) {
        "normal" => formatted.green().to_string(),
        "suspicious" => formatted.yellow().to_string(),
        _ => formatted.red().to_string(),
    }
}

/// Format a unix timestamp for display
pub fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
