//! Lower-casing of record names and the fields that reference them.
//!
//! Which fields count as references is fixed per record kind in the tables
//! below. A field missing from a record is skipped; references are never
//! checked for existence.

use serde_json::Value;

use crate::document::{NamedRecord, Record};

/// Whether a reference field holds one name or a list of names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceShape {
    Single,
    List,
}

/// A field whose value names a record in another category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossReference {
    pub field: &'static str,
    pub shape: ReferenceShape,
}

impl CrossReference {
    const fn single(field: &'static str) -> Self {
        Self { field, shape: ReferenceShape::Single }
    }

    const fn list(field: &'static str) -> Self {
        Self { field, shape: ReferenceShape::List }
    }
}

/// References that may appear on any named record
pub const NAMED_RECORD_REFERENCES: &[CrossReference] = &[
    CrossReference::list("ownerNames"),
    CrossReference::single("rubricName"),
    CrossReference::list("transmitterNames"),
    CrossReference::list("transmitterGroupNames"),
    CrossReference::list("callSignNames"),
];

pub const CALL_REFERENCES: &[CrossReference] = &[
    CrossReference::single("ownerName"),
    CrossReference::list("callSignNames"),
    CrossReference::list("transmitterGroupNames"),
];

pub const NEWS_REFERENCES: &[CrossReference] = &[CrossReference::single("rubricName")];

/// Lower-case the name and every present reference field of a named record.
///
/// Returns how many fields actually changed.
pub fn normalize_named_record(record: &mut NamedRecord) -> usize {
    let mut changed = 0;

    let lowered = record.name().to_lowercase();
    if lowered != record.name() {
        record.set_name(lowered);
        changed += 1;
    }

    changed + normalize_references(record.fields_mut(), NAMED_RECORD_REFERENCES)
}

pub fn normalize_call(record: &mut Record) -> usize {
    normalize_references(record, CALL_REFERENCES)
}

pub fn normalize_news(record: &mut Record) -> usize {
    normalize_references(record, NEWS_REFERENCES)
}

/// Apply the given reference table to a record
pub fn normalize_references(record: &mut Record, references: &[CrossReference]) -> usize {
    let mut changed = 0;

    for reference in references {
        let Some(value) = record.get_mut(reference.field) else {
            continue;
        };

        let touched = match (reference.shape, value) {
            (ReferenceShape::Single, Value::String(name)) => lowercase_in_place(name),
            (ReferenceShape::List, Value::Array(names)) => {
                let mut any = false;
                for item in names.iter_mut() {
                    if let Value::String(name) = item {
                        any |= lowercase_in_place(name);
                    }
                }
                any
            }
            (_, other) => {
                tracing::debug!(
                    field = reference.field,
                    found = %other,
                    "Reference field has unexpected shape, left unchanged"
                );
                false
            }
        };

        if touched {
            changed += 1;
        }
    }

    changed
}

fn lowercase_in_place(name: &mut String) -> bool {
    let lowered = name.to_lowercase();
    if lowered == *name {
        return false;
    }
    *name = lowered;
    true
}
