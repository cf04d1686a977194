use serde_json::Value;
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::{
    config::{CollisionPolicy, ConfigError, MigrationOptions},
    document::{Category, MigratedDocument, NamedRecord, RecordMap, SourceDocument},
    normalization::{normalize_call, normalize_named_record, normalize_news},
    reporter::{CategorySummary, MigrationReport, NameCollision},
    validation::{parse_source, ValidationReport},
};

/// Exit code for invalid invocations and unusable configuration
pub const EXIT_USAGE: u8 = 2;
/// Exit code for every failure during the migration itself
pub const EXIT_FAILURE: u8 = 1;

/// Label used in errors when the document did not come from a file
const IN_MEMORY_SOURCE: &str = "<in-memory document>";

/// Errors that abort a migration run
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot read input file {path}: {source}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed input {input}: {reason}")]
    MalformedInput { input: String, reason: String },

    #[error("Name collision in {category}: more than one record maps to '{name}'")]
    NameCollision { category: Category, name: String },

    #[error("Failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MigrationError {
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrationError::Usage(_) | MigrationError::Config(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    fn malformed(input: &str, validation: &ValidationReport) -> Self {
        MigrationError::MalformedInput {
            input: input.to_string(),
            reason: validation.to_string(),
        }
    }
}

/// Converts a state dump from list-per-category to the name-keyed layout
pub struct SchemaMigrator {
    options: MigrationOptions,
}

impl SchemaMigrator {
    pub fn new(options: MigrationOptions) -> Self {
        Self { options }
    }

    /// Migrate the document at `input` and write it to the configured output path
    pub fn migrate(&self, input: &Path) -> Result<MigratedDocument, MigrationError> {
        self.migrate_with_report(input).map(|(document, _)| document)
    }

    pub fn migrate_with_report(
        &self,
        input: &Path,
    ) -> Result<(MigratedDocument, MigrationReport), MigrationError> {
        tracing::info!(input = %input.display(), "Starting state migration");

        let (source, validation) = self.load(input)?;
        let (document, mut report) = self.transform(source)?;
        report.input = Some(input.to_path_buf());
        report.warnings = warning_messages(&validation);

        self.write(&document, &self.options.output_path)?;
        report.output = Some(self.options.output_path.clone());

        tracing::info!(output = %self.options.output_path.display(), "State migration complete");
        Ok((document, report))
    }

    /// Read, parse and structurally validate the input file
    pub fn load(&self, input: &Path) -> Result<(SourceDocument, ValidationReport), MigrationError> {
        let file = File::open(input).map_err(|source| MigrationError::NotFound {
            path: input.to_path_buf(),
            source,
        })?;

        let value: Value = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            if e.is_io() {
                MigrationError::NotFound {
                    path: input.to_path_buf(),
                    source: io::Error::from(e),
                }
            } else {
                MigrationError::MalformedInput {
                    input: input.display().to_string(),
                    reason: format!("invalid JSON: {}", e),
                }
            }
        })?;

        self.validate(&input.display().to_string(), value)
    }

    /// Validate and transform an already-parsed document without touching disk
    pub fn migrate_value(
        &self,
        value: Value,
    ) -> Result<(MigratedDocument, MigrationReport), MigrationError> {
        let (source, validation) = self.validate(IN_MEMORY_SOURCE, value)?;
        let (document, mut report) = self.transform(source)?;
        report.warnings = warning_messages(&validation);
        Ok((document, report))
    }

    fn validate(
        &self,
        input: &str,
        value: Value,
    ) -> Result<(SourceDocument, ValidationReport), MigrationError> {
        // Errors reach the user through the returned error only
        let (source, validation) =
            parse_source(value).map_err(|validation| MigrationError::malformed(input, &validation))?;

        for warning in &validation.warnings {
            tracing::warn!(field = %warning.field_path, "{}", warning.message);
        }

        Ok((source, validation))
    }

    /// Regroup, normalize and enrich a loaded document in memory
    pub fn transform(
        &self,
        source: SourceDocument,
    ) -> Result<(MigratedDocument, MigrationReport), MigrationError> {
        let mut report = MigrationReport {
            normalized: self.options.normalize,
            enriched: self.options.enrich,
            ..MigrationReport::default()
        };

        let (mut calls, mut news, categories) = source.into_parts();

        if self.options.normalize {
            for call in &mut calls {
                report.normalized_fields += normalize_call(call);
            }
            for item in &mut news {
                report.normalized_fields += normalize_news(item);
            }
        }
        report.calls = calls.len();
        report.news = news.len();

        let mut document = MigratedDocument {
            calls,
            news,
            ..MigratedDocument::default()
        };

        for (category, records) in Category::ALL.into_iter().zip(categories) {
            let source_records = records.len();
            let mapping = self.regroup(category, records, &mut report)?;

            report.categories.push(CategorySummary {
                category,
                source_records,
                migrated_records: mapping.len(),
            });
            *document.category_mut(category) = mapping;
        }

        if self.options.enrich {
            report.enriched_records = self.enrich_transmitters(&mut document.transmitters);
        }

        tracing::debug!(
            normalized_fields = report.normalized_fields,
            enriched_records = report.enriched_records,
            collisions = report.collisions.len(),
            "Document transformed"
        );

        Ok((document, report))
    }

    /// Turn a category list into a mapping keyed by record name
    fn regroup(
        &self,
        category: Category,
        records: Vec<NamedRecord>,
        report: &mut MigrationReport,
    ) -> Result<RecordMap, MigrationError> {
        let mut mapping = RecordMap::new();

        for mut record in records {
            if self.options.normalize {
                report.normalized_fields += normalize_named_record(&mut record);
            }

            let name = record.name().to_string();
            if mapping.contains_key(&name) {
                match self.options.collision_policy {
                    CollisionPolicy::Overwrite => {
                        tracing::debug!(%category, %name, "Replacing record with duplicate name");
                    }
                    CollisionPolicy::Warn => {
                        tracing::warn!(%category, %name, "Duplicate record name, keeping the last one");
                        report.collisions.push(NameCollision {
                            category,
                            name: name.clone(),
                        });
                    }
                    CollisionPolicy::Reject => {
                        return Err(MigrationError::NameCollision { category, name });
                    }
                }
            }

            mapping.insert(name, Value::Object(record.into_record()));
        }

        Ok(mapping)
    }

    fn enrich_transmitters(&self, transmitters: &mut RecordMap) -> usize {
        let defaults = &self.options.transmitter_defaults;
        let mut enriched = 0;

        for value in transmitters.values_mut() {
            if let Value::Object(record) = value {
                defaults.apply(record);
                enriched += 1;
            }
        }

        enriched
    }

    /// Write the document as indented JSON.
    ///
    /// Output goes to a uniquely named staging file beside the destination
    /// and is renamed into place, so a failed write leaves any previous
    /// output untouched. A symlinked destination is written through.
    pub fn write(&self, document: &MigratedDocument, path: &Path) -> Result<(), MigrationError> {
        write_json(document, path).map_err(|source| MigrationError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Wrote migrated document");
        Ok(())
    }
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new(MigrationOptions::default())
    }
}

fn write_json(document: &MigratedDocument, path: &Path) -> io::Result<()> {
    // Rename over the link target, not the link itself
    let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut prefix = OsString::from(".");
    prefix.push(target.file_name().unwrap_or_else(|| OsStr::new("state")));
    prefix.push(".");

    // Dropping the staging file on any early return removes it
    let mut staging = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(&dir)?;

    {
        let mut writer = BufWriter::new(staging.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, document)?;
        writer.flush()?;
    }
    copy_output_permissions(staging.as_file(), &target)?;
    staging.as_file().sync_all()?;

    staging.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

/// Keep the mode of an existing output; new files get the usual 0644
#[cfg(unix)]
fn copy_output_permissions(staging: &File, target: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = match fs::metadata(target) {
        Ok(meta) => meta.permissions(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::Permissions::from_mode(0o644),
        Err(e) => return Err(e),
    };
    staging.set_permissions(permissions)
}

#[cfg(not(unix))]
fn copy_output_permissions(_staging: &File, _target: &Path) -> io::Result<()> {
    Ok(())
}

fn warning_messages(validation: &ValidationReport) -> Vec<String> {
    validation
        .warnings
        .iter()
        .map(|w| format!("{}: {}", w.field_path, w.message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::TransmitterDefaults;
    use serde_json::json;

    fn state(overrides: Value) -> Value {
        let mut base = json!({
            "calls": [], "news": [], "rubrics": [], "callSigns": [],
            "users": [], "nodes": [], "transmitters": [], "transmitterGroups": []
        });
        if let (Some(base_map), Value::Object(extra)) = (base.as_object_mut(), overrides) {
            base_map.extend(extra);
        }
        base
    }

    #[test]
    fn test_enriched_example() {
        let migrator = SchemaMigrator::default();
        let (document, report) = migrator
            .migrate_value(state(json!({
                "rubrics": [{"name": "Sports"}],
                "transmitters": [{"name": "TX1"}]
            })))
            .unwrap();

        assert_eq!(
            Value::Object(document.transmitters),
            json!({"tx1": {
                "name": "tx1",
                "status": "OFFLINE",
                "antennaType": "OMNI",
                "usage": "WIDERANGE",
                "authKey": "test1234"
            }})
        );
        assert_eq!(Value::Object(document.rubrics), json!({"sports": {"name": "sports"}}));
        assert_eq!(report.enriched_records, 1);
        assert_eq!(report.normalized_fields, 2);
    }

    #[test]
    fn test_legacy_variant_only_regroups() {
        let migrator = SchemaMigrator::new(MigrationOptions::legacy());
        let (document, report) = migrator
            .migrate_value(state(json!({
                "calls": [{"ownerName": "Alice", "callSignNames": ["DB0ABC"], "transmitterGroupNames": []}],
                "users": [{"name": "Alice", "admin": true}],
                "transmitters": [{"name": "TX1", "status": "ONLINE"}]
            })))
            .unwrap();

        assert_eq!(document.calls[0]["ownerName"], json!("Alice"));
        assert_eq!(Value::Object(document.users), json!({"Alice": {"name": "Alice", "admin": true}}));
        assert_eq!(
            Value::Object(document.transmitters),
            json!({"TX1": {"name": "TX1", "status": "ONLINE"}})
        );
        assert_eq!(report.normalized_fields, 0);
        assert_eq!(report.enriched_records, 0);
    }

    #[test]
    fn test_calls_and_news_stay_lists() {
        let (document, report) = SchemaMigrator::default()
            .migrate_value(state(json!({
                "calls": [
                    {"ownerName": "Alice", "callSignNames": ["DB0ABC"], "transmitterGroupNames": ["All"]},
                    {"ownerName": "Bob"}
                ],
                "news": [{"rubricName": "Weather", "text": "Sunny", "number": 1}]
            })))
            .unwrap();

        assert_eq!(
            document.calls,
            vec![
                json!({"ownerName": "alice", "callSignNames": ["db0abc"], "transmitterGroupNames": ["all"]})
                    .as_object()
                    .unwrap()
                    .clone(),
                json!({"ownerName": "bob"}).as_object().unwrap().clone(),
            ]
        );
        assert_eq!(document.news[0]["rubricName"], json!("weather"));
        assert_eq!(document.news[0]["text"], json!("Sunny"));
        assert_eq!(report.calls, 2);
        assert_eq!(report.news, 1);
    }

    #[test]
    fn test_duplicate_names_last_one_wins() {
        let (document, report) = SchemaMigrator::default()
            .migrate_value(state(json!({
                "rubrics": [
                    {"name": "News", "label": "first"},
                    {"name": "Sports"},
                    {"name": "news", "label": "second"}
                ]
            })))
            .unwrap();

        assert_eq!(document.rubrics.len(), 2);
        assert_eq!(document.rubrics["news"]["label"], json!("second"));
        let keys: Vec<&String> = document.rubrics.keys().collect();
        assert_eq!(keys, vec!["news", "sports"]);
        assert_eq!(
            report.collisions,
            vec![NameCollision {
                category: Category::Rubrics,
                name: "news".to_string()
            }]
        );
        let summary = report.category(Category::Rubrics).unwrap();
        assert_eq!((summary.source_records, summary.migrated_records), (3, 2));
    }

    #[test]
    fn test_duplicate_names_overwrite_is_silent() {
        let migrator = SchemaMigrator::new(
            MigrationOptions::default().with_collision_policy(CollisionPolicy::Overwrite),
        );
        let (document, report) = migrator
            .migrate_value(state(json!({"nodes": [{"name": "A"}, {"name": "a"}]})))
            .unwrap();

        assert_eq!(document.nodes.len(), 1);
        assert!(report.collisions.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let migrator = SchemaMigrator::new(
            MigrationOptions::default().with_collision_policy(CollisionPolicy::Reject),
        );
        let err = migrator
            .migrate_value(state(json!({"rubrics": [{"name": "News"}, {"name": "news"}]})))
            .unwrap_err();

        assert!(matches!(
            err,
            MigrationError::NameCollision { category: Category::Rubrics, ref name } if name == "news"
        ));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_legacy_keeps_case_distinct_names() {
        let (document, report) = SchemaMigrator::new(MigrationOptions::legacy())
            .migrate_value(state(json!({"rubrics": [{"name": "News"}, {"name": "news"}]})))
            .unwrap();

        assert_eq!(document.rubrics.len(), 2);
        assert!(report.collisions.is_empty());
    }

    #[test]
    fn test_missing_key_is_malformed_input() {
        let mut value = state(json!({}));
        value.as_object_mut().unwrap().remove("nodes");

        let err = SchemaMigrator::default().migrate_value(value).unwrap_err();

        match &err {
            MigrationError::MalformedInput { reason, .. } => assert!(reason.contains("/nodes")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_custom_transmitter_defaults() {
        let mut options = MigrationOptions::default();
        options.transmitter_defaults = TransmitterDefaults {
            status: "ONLINE".to_string(),
            ..TransmitterDefaults::default()
        };

        let (document, _) = SchemaMigrator::new(options)
            .migrate_value(state(json!({"transmitters": [{"name": "tx1"}]})))
            .unwrap();

        assert_eq!(document.transmitters["tx1"]["status"], json!("ONLINE"));
        assert_eq!(document.transmitters["tx1"]["usage"], json!("WIDERANGE"));
    }

    #[test]
    fn test_enrichment_only_touches_transmitters() {
        let (document, _) = SchemaMigrator::default()
            .migrate_value(state(json!({
                "transmitterGroups": [{"name": "North", "transmitterNames": ["TX1"]}]
            })))
            .unwrap();

        assert_eq!(
            Value::Object(document.transmitter_groups),
            json!({"north": {"name": "north", "transmitterNames": ["tx1"]}})
        );
    }

    #[test]
    fn test_unknown_top_level_key_reported_as_warning() {
        let (document, report) = SchemaMigrator::default()
            .migrate_value(state(json!({"schemaVersion": 1})))
            .unwrap();

        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("/schemaVersion"));
        let value = serde_json::to_value(&document).unwrap();
        assert!(value.get("schemaVersion").is_none());
    }

    #[test]
    fn test_write_leaves_only_the_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("State_new.json");

        SchemaMigrator::default()
            .write(&MigratedDocument::default(), &output)
            .unwrap();

        let entries: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries, vec![output]);
    }

    #[test]
    fn test_write_into_missing_directory_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing").join("State_new.json");

        let err = SchemaMigrator::default()
            .write(&MigratedDocument::default(), &output)
            .unwrap_err();

        assert!(matches!(err, MigrationError::Write { ref path, .. } if path == &output));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = MigrationError::Usage("no input file given".to_string());
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert_eq!(err.to_string(), "no input file given");
    }
}
