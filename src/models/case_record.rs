use super::BusinessProcess;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a record in the remote store.
///
/// Linked sub-records (general applications) share the update protocol with their
/// parent case but live under their own identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    Primary(String),
    Linked(String),
}

impl RecordRef {
    pub fn primary(case_id: impl Into<String>) -> Self {
        Self::Primary(case_id.into())
    }

    pub fn linked(sub_record_id: impl Into<String>) -> Self {
        Self::Linked(sub_record_id.into())
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Primary(id) | Self::Linked(id) => id,
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary(id) => write!(f, "case:{id}"),
            Self::Linked(id) => write!(f, "linked:{id}"),
        }
    }
}

/// A case record as held by the remote store. `case_data` is opaque to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub id: String,
    #[serde(default)]
    pub case_data: serde_json::Value,
    #[serde(default)]
    pub business_process: BusinessProcess,
}

impl CaseRecord {
    pub fn new(id: impl Into<String>, business_process: BusinessProcess) -> Self {
        Self {
            id: id.into(),
            case_data: serde_json::json!({}),
            business_process,
        }
    }

    pub fn with_case_data(mut self, case_data: serde_json::Value) -> Self {
        self.case_data = case_data;
        self
    }

    /// Read a field of the opaque payload by JSON pointer (e.g. `/documents/0/name`)
    pub fn field(&self, pointer: &str) -> Option<&serde_json::Value> {
        self.case_data.pointer(pointer)
    }
}
