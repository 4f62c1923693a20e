use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::CoreError;

/// Value vocabulary a field descriptor may declare.
///
/// The vocabulary is closed: a descriptor naming anything outside it is a
/// construction-time error, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Url,
    List,
}

impl FieldType {
    /// Parse a wire string into the closed vocabulary.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "url" => Ok(Self::Url),
            "list" => Ok(Self::List),
            other => Err(CoreError::schema_definition(format!(
                "unrecognized field type '{other}' (expected string, number, boolean, url, or list)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Url => "url",
            Self::List => "list",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named, typed, described unit of data the agent should extract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
}

impl FieldDescriptor {
    pub fn new(
        field_name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            field_type,
            description: description.into(),
        }
    }
}

/// Structured, immutable description of one research task: what to search
/// for, where, which fields to extract, and how to judge success.
///
/// Construction goes through [`TaskPlan::new`] so every value of this type
/// upholds the plan invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub task_name: String,
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub target_websites: Vec<String>,
    pub data_to_extract: Vec<FieldDescriptor>,
    pub success_criteria: String,
    /// Illustrative record used for prompting only, never for validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_output: Option<serde_json::Value>,
}

impl TaskPlan {
    /// Build a plan, enforcing the invariants: at least one search term, at
    /// least one field descriptor, and unique field names.
    pub fn new(
        task_name: impl Into<String>,
        search_terms: Vec<String>,
        target_websites: Vec<String>,
        data_to_extract: Vec<FieldDescriptor>,
        success_criteria: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let search_terms: Vec<String> = search_terms
            .into_iter()
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty())
            .collect();
        if search_terms.is_empty() {
            return Err(CoreError::plan_generation(
                "plan contains no usable search terms",
            ));
        }

        check_descriptors(&data_to_extract)?;

        let mut seen_sites = HashSet::new();
        let target_websites: Vec<String> = target_websites
            .into_iter()
            .map(|site| site.trim().to_string())
            .filter(|site| !site.is_empty() && seen_sites.insert(site.to_ascii_lowercase()))
            .collect();

        Ok(Self {
            task_name: task_name.into().trim().to_string(),
            search_terms,
            target_websites,
            data_to_extract,
            success_criteria: success_criteria.into().trim().to_string(),
            example_output: None,
        })
    }

    pub fn with_example_output(mut self, example: serde_json::Value) -> Self {
        self.example_output = Some(example);
        self
    }

    /// Declared field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.data_to_extract
            .iter()
            .map(|field| field.field_name.as_str())
    }

    /// Whether the plan restricts the agent to specific websites.
    pub fn is_unrestricted(&self) -> bool {
        self.target_websites.is_empty()
    }
}

/// Shared descriptor-set checks used at plan construction and schema
/// synthesis: non-empty set, unique names.
pub(crate) fn check_descriptors(descriptors: &[FieldDescriptor]) -> Result<(), CoreError> {
    if descriptors.is_empty() {
        return Err(CoreError::schema_definition(
            "plan declares no fields to extract",
        ));
    }
    let mut seen = HashSet::new();
    for descriptor in descriptors {
        let name = descriptor.field_name.trim();
        if name.is_empty() {
            return Err(CoreError::schema_definition("field name cannot be empty"));
        }
        if !seen.insert(name.to_string()) {
            return Err(CoreError::schema_definition(format!(
                "duplicate field name '{name}'"
            )));
        }
    }
    Ok(())
}
