//! Validated run output: extraction records and the run verdict.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One extracted item, keyed strictly by declared field names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionRecord(pub Map<String, Value>);

impl ExtractionRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn field_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Verdict for a completed run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// At least one record carries every declared field.
    Success,
    /// Records exist, but none is fully populated.
    Partial,
    /// No usable records survived validation.
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
        }
    }
}

/// Records plus verdict plus the one-line judgment rationale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub records: Vec<ExtractionRecord>,
    pub status: RunStatus,
    pub rationale: String,
}

impl RunResult {
    pub fn success(records: Vec<ExtractionRecord>, rationale: impl Into<String>) -> Self {
        Self {
            records,
            status: RunStatus::Success,
            rationale: rationale.into(),
        }
    }

    pub fn partial(records: Vec<ExtractionRecord>, rationale: impl Into<String>) -> Self {
        Self {
            records,
            status: RunStatus::Partial,
            rationale: rationale.into(),
        }
    }

    pub fn failure(rationale: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            status: RunStatus::Failure,
            rationale: rationale.into(),
        }
    }
}
