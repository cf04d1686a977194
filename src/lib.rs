// State dump migration: category lists to name-keyed mappings
pub mod config;
pub mod document;
pub mod enrichment;
pub mod migrator;
pub mod normalization;
pub mod reporter;
pub mod validation;

use std::path::Path;

// Re-export core types for convenience
pub use config::{CollisionPolicy, MigrationConfig, MigrationOptions, DEFAULT_OUTPUT_PATH};
pub use document::{Category, MigratedDocument, NamedRecord, Record, SourceDocument};
pub use enrichment::TransmitterDefaults;
pub use migrator::{MigrationError, SchemaMigrator};
pub use reporter::{MigrationReport, MigrationReporter, ReportFormat};
pub use validation::ValidationReport;

/// Migrate `input` with the default (normalizing, enriching) settings,
/// writing the result to `State_new.json` in the working directory.
pub fn migrate(input: &Path) -> Result<MigratedDocument, MigrationError> {
    SchemaMigrator::default().migrate(input)
}
