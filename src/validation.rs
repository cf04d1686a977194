use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::document::{
    Category, NamedRecord, Record, SourceDocument, CALLS_KEY, NAME_FIELD, NEWS_KEY, REQUIRED_KEYS,
};

/// Structural problems found in a state dump before it is regrouped
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Required top-level keys reported as absent
    pub fn missing_keys(&self) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| matches!(e.error_type, ValidationErrorType::MissingRequiredKey))
            .map(|e| e.field_path.trim_start_matches('/'))
            .collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_path: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    NotAnObject,
    MissingRequiredKey,
    NotAnArray,
    InvalidRecord,
    MissingName,
}

impl ValidationError {
    pub fn new(field_path: String, error_type: ValidationErrorType, message: String) -> Self {
        Self {
            field_path,
            error_type,
            message,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.message)
    }
}

/// Non-fatal finding, logged but not carried into the output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field_path: String,
    pub message: String,
}

/// Validate the loaded JSON and split it into a [`SourceDocument`].
///
/// Every problem is collected instead of stopping at the first, so the caller
/// can report all missing keys and bad records at once.
pub fn parse_source(value: Value) -> Result<(SourceDocument, ValidationReport), ValidationReport> {
    let mut report = ValidationReport::new();

    let mut root = match value {
        Value::Object(map) => map,
        other => {
            report.add_error(ValidationError::new(
                "/".to_string(),
                ValidationErrorType::NotAnObject,
                format!("document root must be an object, found {}", type_name(&other)),
            ));
            return Err(report);
        }
    };

    for key in root.keys() {
        if !REQUIRED_KEYS.contains(&key.as_str()) {
            report.add_warning(ValidationWarning {
                field_path: format!("/{}", key),
                message: "unknown top-level key is not carried into the output".to_string(),
            });
        }
    }

    let mut lists = Vec::with_capacity(REQUIRED_KEYS.len());
    for key in REQUIRED_KEYS {
        lists.push(take_array(&mut root, key, &mut report));
    }

    let mut lists = lists.into_iter();
    let calls = plain_records(CALLS_KEY, lists.next().flatten(), &mut report);
    let news = plain_records(NEWS_KEY, lists.next().flatten(), &mut report);

    let mut document = SourceDocument::new(calls, news);
    for (category, items) in Category::ALL.into_iter().zip(lists) {
        let records = named_records(category, items, &mut report);
        document = document.with_records(category, records);
    }

    if report.is_valid() {
        Ok((document, report))
    } else {
        Err(report)
    }
}

fn take_array(
    root: &mut Record,
    key: &str,
    report: &mut ValidationReport,
) -> Option<Vec<Value>> {
    match root.remove(key) {
        Some(Value::Array(items)) => Some(items),
        Some(other) => {
            report.add_error(ValidationError::new(
                format!("/{}", key),
                ValidationErrorType::NotAnArray,
                format!("expected an array, found {}", type_name(&other)),
            ));
            None
        }
        None => {
            report.add_error(ValidationError::new(
                format!("/{}", key),
                ValidationErrorType::MissingRequiredKey,
                "required key is missing".to_string(),
            ));
            None
        }
    }
}

fn plain_records(key: &str, items: Option<Vec<Value>>, report: &mut ValidationReport) -> Vec<Record> {
    let mut records = Vec::new();
    for (index, item) in items.unwrap_or_default().into_iter().enumerate() {
        match item {
            Value::Object(map) => records.push(map),
            other => report.add_error(ValidationError::new(
                format!("/{}/{}", key, index),
                ValidationErrorType::InvalidRecord,
                format!("expected an object, found {}", type_name(&other)),
            )),
        }
    }
    records
}

fn named_records(
    category: Category,
    items: Option<Vec<Value>>,
    report: &mut ValidationReport,
) -> Vec<NamedRecord> {
    let mut records = Vec::new();
    for (index, item) in items.unwrap_or_default().into_iter().enumerate() {
        let fields = match item {
            Value::Object(map) => map,
            other => {
                report.add_error(ValidationError::new(
                    format!("/{}/{}", category.key(), index),
                    ValidationErrorType::InvalidRecord,
                    format!("expected an object, found {}", type_name(&other)),
                ));
                continue;
            }
        };
        match NamedRecord::new(fields) {
            Ok(named) => records.push(named),
            Err(_) => report.add_error(ValidationError::new(
                format!("/{}/{}/{}", category.key(), index, NAME_FIELD),
                ValidationErrorType::MissingName,
                "record must have a string `name`".to_string(),
            )),
        }
    }
    records
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
