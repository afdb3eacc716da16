//! Data models
//!
//! `Snapshot` and `ChangeSet` are ordered field maps; field order follows
//! `StatusFields` so outbound JSON keeps a stable layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// ============================================================================
// Snapshot / ChangeSet
// ============================================================================

/// One complete read of printer status fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<StatusFields> for Snapshot {
    fn from(fields: StatusFields) -> Self {
        match serde_json::to_value(fields) {
            Ok(Value::Object(map)) => Snapshot(map),
            // A plain struct of scalars always serializes to an object
            _ => Snapshot::default(),
        }
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}

/// Fields of a snapshot whose value changed since the previous one
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(Map<String, Value>);

impl ChangeSet {
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn insert(&mut self, key: String, value: Value) {
        self.0.insert(key, value);
    }
}

impl PartialEq<Snapshot> for ChangeSet {
    fn eq(&self, other: &Snapshot) -> bool {
        self.0 == other.0
    }
}

/// Payload sent over the uplink; built per send, never retained
#[derive(Debug, Serialize)]
pub struct OutboundMessage<'a> {
    pub printer_socket_key: &'a str,
    pub data: &'a ChangeSet,
}

impl<'a> OutboundMessage<'a> {
    pub fn new(printer_socket_key: &'a str, data: &'a ChangeSet) -> Self {
        Self {
            printer_socket_key,
            data,
        }
    }
}

// ============================================================================
// Typed status fields
// ============================================================================

/// Status fields in outbound order. `None` serializes as JSON null.
#[derive(Debug, Clone, Serialize)]
pub struct StatusFields {
    pub printer_status: String,
    pub file_name: Option<String>,
    pub elapsed_time: Option<Number>,
    pub estimated_time: Option<Number>,
    pub b_temp: Option<f64>,
    pub e_temp: Option<f64>,
    pub file_size: Option<u64>,
    pub file_pos: Option<u64>,
    pub progress: i64,
}

// ============================================================================
// OctoPrint API responses
// ============================================================================

/// `GET /api/job`
#[derive(Debug, Deserialize)]
pub struct JobResponse {
    pub state: String,
    pub job: JobInfo,
    pub progress: JobProgress,
}

#[derive(Debug, Deserialize)]
pub struct JobInfo {
    pub file: JobFile,
    #[serde(rename = "estimatedPrintTime", default)]
    pub estimated_print_time: Option<Number>,
}

#[derive(Debug, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct JobProgress {
    #[serde(default)]
    pub completion: Option<f64>,
    #[serde(default)]
    pub filepos: Option<u64>,
    #[serde(rename = "printTime", default)]
    pub print_time: Option<Number>,
}

/// Bed and tool temperatures from `GET /api/printer`; `None` when not reported
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Temperatures {
    pub bed: Option<f64>,
    pub tool0: Option<f64>,
}
