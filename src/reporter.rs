use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use crate::document::Category;

/// Reporter for rendering a migration summary
pub struct MigrationReporter {
    output_format: ReportFormat,
}

/// Available output formats for migration reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Console,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            _ => Err(ReportError::FormatError(format!("unknown report format '{}'", s))),
        }
    }
}

/// Outcome of one migration run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub normalized: bool,
    pub enriched: bool,
    pub calls: usize,
    pub news: usize,
    pub categories: Vec<CategorySummary>,
    pub normalized_fields: usize,
    pub enriched_records: usize,
    pub collisions: Vec<NameCollision>,
    pub warnings: Vec<String>,
}

/// Record counts for one category before and after regrouping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: Category,
    pub source_records: usize,
    pub migrated_records: usize,
}

/// Two records of one category mapped to the same key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCollision {
    pub category: Category,
    pub name: String,
}

impl MigrationReport {
    pub fn category(&self, category: Category) -> Option<&CategorySummary> {
        self.categories.iter().find(|s| s.category == category)
    }

    pub fn has_collisions(&self) -> bool {
        !self.collisions.is_empty()
    }
}

impl MigrationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => self.format_json_report(report),
        }
    }

    fn format_console_report(&self, report: &MigrationReport) -> String {
        let mut output = String::new();

        output.push_str("=== State Migration Report ===\n\n");

        if let Some(ref input) = report.input {
            let _ = writeln!(output, "Input:  {}", input.display());
        }
        if let Some(ref out) = report.output {
            let _ = writeln!(output, "Output: {}", out.display());
        }
        let _ = writeln!(
            output,
            "Normalization: {}  Enrichment: {}\n",
            on_off(report.normalized),
            on_off(report.enriched)
        );

        let _ = writeln!(output, "  calls: {} (kept as list)", report.calls);
        let _ = writeln!(output, "  news: {} (kept as list)", report.news);
        for summary in &report.categories {
            let _ = writeln!(
                output,
                "  {}: {} → {}",
                summary.category, summary.source_records, summary.migrated_records
            );
        }

        if report.normalized {
            let _ = writeln!(output, "\nFields lower-cased: {}", report.normalized_fields);
        }
        if report.enriched {
            let _ = writeln!(output, "Transmitters enriched: {}", report.enriched_records);
        }

        // Each collision and warning was already logged on its own
        if report.has_collisions() {
            let _ = writeln!(output, "Name collisions (last record kept): {}", report.collisions.len());
        }
        if !report.warnings.is_empty() {
            let _ = writeln!(output, "Warnings: {}", report.warnings.len());
        }

        output
    }

    fn format_json_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::SerializationError(e.to_string()))
    }
}

impl Default for MigrationReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Format error: {0}")]
    FormatError(String),
}
