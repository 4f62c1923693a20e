//! Result validator: normalizes raw agent output, conforms candidate
//! records to the schema, and judges the run.
//!
//! Judging is deterministic. One fully populated record guarantees
//! success; no collaborator opinion can override that floor.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::CoreError;
use crate::plan::{FieldType, TaskPlan};
use crate::record::{ExtractionRecord, RunResult};
use crate::schema::RecordSchema;

/// Envelope keys probed, in order, when the agent wraps its record array.
const ENVELOPE_KEYS: [&str; 4] = ["found_items", "items", "results", "records"];

/// Alternate key names accepted, in order, when a declared name is absent
/// from a candidate record.
fn aliases_for(field_type: FieldType) -> &'static [&'static str] {
    match field_type {
        FieldType::String => &[
            "title",
            "name",
            "snippet",
            "description",
            "text",
            "url",
            "link",
        ],
        FieldType::Number => &["position", "rank", "price", "count"],
        FieldType::Url => &["url", "link", "href"],
        FieldType::Boolean | FieldType::List => &[],
    }
}

/// Validate `raw_output` against `schema` and judge the run.
///
/// Unrecoverable shapes (non-JSON-record output, envelope key that is not
/// an array) surface as [`CoreError::MalformedOutput`]; an agent that ran
/// fine but found nothing yields a failure verdict instead.
pub fn evaluate(
    raw_output: &Value,
    plan: &TaskPlan,
    schema: &RecordSchema,
) -> Result<RunResult, CoreError> {
    let candidates = normalize(raw_output)?;

    let mut records = Vec::new();
    for candidate in candidates {
        let record = conform_record(candidate, schema);
        if record.is_empty() {
            debug!(target: "validator", "dropped record with no recognizable fields");
            continue;
        }
        records.push(record);
    }

    let total = records.len();
    let fully_populated = records
        .iter()
        .filter(|record| record.field_count() == schema.field_count())
        .count();

    if fully_populated > 0 {
        return Ok(RunResult::success(
            records,
            format!("{fully_populated} of {total} record(s) carried every declared field"),
        ));
    }
    if total > 0 {
        return Ok(RunResult::partial(
            records,
            format!("{total} record(s) extracted but none carried every declared field"),
        ));
    }
    Ok(RunResult::failure(format!(
        "no usable records extracted; success criteria not met: {}",
        plan.success_criteria
    )))
}

/// Reduce the raw output to candidate record objects.
///
/// Accepted shapes: a bare array of records, an object wrapping records
/// under one of [`ENVELOPE_KEYS`], or a single record object.
fn normalize(raw: &Value) -> Result<Vec<&Map<String, Value>>, CoreError> {
    match raw {
        Value::Array(entries) => collect_objects(entries),
        Value::Object(map) => {
            for key in ENVELOPE_KEYS {
                if let Some(wrapped) = map.get(key) {
                    let entries = wrapped.as_array().ok_or_else(|| {
                        CoreError::malformed_output(format!(
                            "envelope key '{key}' is not an array"
                        ))
                    })?;
                    return collect_objects(entries);
                }
            }
            // No envelope key: the object itself is one candidate record.
            Ok(vec![map])
        }
        other => Err(CoreError::malformed_output(format!(
            "agent output was not an object or array (got {})",
            value_kind(other)
        ))),
    }
}

fn collect_objects(entries: &[Value]) -> Result<Vec<&Map<String, Value>>, CoreError> {
    let objects: Vec<&Map<String, Value>> = entries.iter().filter_map(Value::as_object).collect();
    if objects.is_empty() && !entries.is_empty() {
        return Err(CoreError::malformed_output(
            "record array contained no record-like entries",
        ));
    }
    if objects.len() < entries.len() {
        debug!(
            target: "validator",
            skipped = entries.len() - objects.len(),
            "skipped non-object entries in record array"
        );
    }
    Ok(objects)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Project one candidate object onto the declared fields.
///
/// Exact names bind first. Aliases then fill, in declaration order, only
/// fields whose declared key is absent from the candidate, so a declared
/// key that fails coercion leaves its field empty rather than being
/// backfilled from a sibling key. A candidate key matching any declared
/// name is never claimed as an alias. Undeclared keys are dropped.
fn conform_record(candidate: &Map<String, Value>, schema: &RecordSchema) -> ExtractionRecord {
    let mut record = ExtractionRecord::new();

    for field in schema.fields() {
        if let Some(value) = candidate.get(&field.field_name) {
            if let Some(coerced) = RecordSchema::coerce_value(field.field_type, value) {
                record.insert(field.field_name.clone(), coerced);
            }
        }
    }

    let mut claimed: HashSet<&str> = HashSet::new();
    for field in schema.fields() {
        if candidate.contains_key(&field.field_name) {
            continue;
        }
        for alias in aliases_for(field.field_type) {
            if schema.declares(alias) || claimed.contains(*alias) {
                continue;
            }
            let Some(value) = candidate.get(*alias) else {
                continue;
            };
            if let Some(coerced) = RecordSchema::coerce_value(field.field_type, value) {
                record.insert(field.field_name.clone(), coerced);
                claimed.insert(alias);
                break;
            }
        }
    }

    record
}
