use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single JSON object from the state dump, keys kept in source order
pub type Record = Map<String, Value>;

/// Name-keyed mapping produced by regrouping a category list
pub type RecordMap = Map<String, Value>;

/// Top-level keys every state dump must carry, in document order
pub const REQUIRED_KEYS: [&str; 8] = [
    "calls",
    "news",
    "rubrics",
    "callSigns",
    "users",
    "nodes",
    "transmitters",
    "transmitterGroups",
];

pub const CALLS_KEY: &str = "calls";
pub const NEWS_KEY: &str = "news";
pub const NAME_FIELD: &str = "name";

/// Record lists that are regrouped into mappings keyed by `name`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Rubrics,
    CallSigns,
    Users,
    Nodes,
    Transmitters,
    TransmitterGroups,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Rubrics,
        Category::CallSigns,
        Category::Users,
        Category::Nodes,
        Category::Transmitters,
        Category::TransmitterGroups,
    ];

    /// JSON key of the category in both the source and the migrated document
    pub fn key(&self) -> &'static str {
        match self {
            Category::Rubrics => "rubrics",
            Category::CallSigns => "callSigns",
            Category::Users => "users",
            Category::Nodes => "nodes",
            Category::Transmitters => "transmitters",
            Category::TransmitterGroups => "transmitterGroups",
        }
    }

    pub fn from_key(key: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A record guaranteed to carry a string `name`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRecord {
    fields: Record,
}

impl NamedRecord {
    /// Wrap a record, handing it back unchanged when `name` is absent or not a string
    pub fn new(fields: Record) -> Result<Self, Record> {
        match fields.get(NAME_FIELD) {
            Some(Value::String(_)) => Ok(Self { fields }),
            _ => Err(fields),
        }
    }

    pub fn name(&self) -> &str {
        self.fields
            .get(NAME_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: String) {
        self.fields.insert(NAME_FIELD.to_string(), Value::String(name));
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Record {
        &mut self.fields
    }

    pub fn into_record(self) -> Record {
        self.fields
    }
}

/// The loaded state dump, after structural validation
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    pub calls: Vec<Record>,
    pub news: Vec<Record>,
    categories: [Vec<NamedRecord>; 6],
}

impl SourceDocument {
    pub fn new(calls: Vec<Record>, news: Vec<Record>) -> Self {
        Self {
            calls,
            news,
            categories: Default::default(),
        }
    }

    pub fn with_records(mut self, category: Category, records: Vec<NamedRecord>) -> Self {
        self.categories[category.index()] = records;
        self
    }

    pub fn records(&self, category: Category) -> &[NamedRecord] {
        &self.categories[category.index()]
    }

    /// Split into the passthrough lists and the category lists, in `Category::ALL` order
    pub fn into_parts(self) -> (Vec<Record>, Vec<Record>, [Vec<NamedRecord>; 6]) {
        (self.calls, self.news, self.categories)
    }
}

/// State dump in the target schema: categories keyed by record name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratedDocument {
    pub calls: Vec<Record>,
    pub news: Vec<Record>,
    pub rubrics: RecordMap,
    pub call_signs: RecordMap,
    pub users: RecordMap,
    pub nodes: RecordMap,
    pub transmitters: RecordMap,
    pub transmitter_groups: RecordMap,
}

impl MigratedDocument {
    pub fn category(&self, category: Category) -> &RecordMap {
        match category {
            Category::Rubrics => &self.rubrics,
            Category::CallSigns => &self.call_signs,
            Category::Users => &self.users,
            Category::Nodes => &self.nodes,
            Category::Transmitters => &self.transmitters,
            Category::TransmitterGroups => &self.transmitter_groups,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut RecordMap {
        match category {
            Category::Rubrics => &mut self.rubrics,
            Category::CallSigns => &mut self.call_signs,
            Category::Users => &mut self.users,
            Category::Nodes => &mut self.nodes,
            Category::Transmitters => &mut self.transmitters,
            Category::TransmitterGroups => &mut self.transmitter_groups,
        }
    }
}
