use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Record;

pub const DEFAULT_STATUS: &str = "OFFLINE";
pub const DEFAULT_ANTENNA_TYPE: &str = "OMNI";
pub const DEFAULT_USAGE: &str = "WIDERANGE";
pub const DEFAULT_AUTH_KEY: &str = "test1234";

/// Placeholder operational attributes written onto every transmitter.
///
/// Existing values are always overwritten; nothing is derived from the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TransmitterDefaults {
    pub status: String,
    pub antenna_type: String,
    pub usage: String,
    pub auth_key: String,
}

impl Default for TransmitterDefaults {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS.to_string(),
            antenna_type: DEFAULT_ANTENNA_TYPE.to_string(),
            usage: DEFAULT_USAGE.to_string(),
            auth_key: DEFAULT_AUTH_KEY.to_string(),
        }
    }
}

impl TransmitterDefaults {
    /// Field name and value pairs in output order
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("status", self.status.as_str()),
            ("antennaType", self.antenna_type.as_str()),
            ("usage", self.usage.as_str()),
            ("authKey", self.auth_key.as_str()),
        ]
    }

    pub fn apply(&self, record: &mut Record) {
        for (field, value) in self.fields() {
            record.insert(field.to_string(), Value::String(value.to_string()));
        }
    }
}
