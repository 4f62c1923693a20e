//! Plan drafter: one natural-language query in, one [`TaskPlan`] out.
//!
//! The drafter makes exactly one call to the text-generation collaborator
//! per invocation. Retry policy belongs to the orchestrator, which re-enters
//! drafting with a fresh plan; no default plan is ever substituted.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::CoreError;
use crate::llm::utils::extract_json_object;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::plan::{FieldDescriptor, FieldType, TaskPlan};

/// System prompt sent with every drafting request.
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a research planner. Turn the user's request into one structured task configuration that will drive a browser-automation agent.

## Response Format

Respond with a single JSON object, preferably inside a ```json block:

```json
{
  "task_name": "short_descriptive_name",
  "search_terms": ["main topic", "topic with qualifier"],
  "target_websites": ["example.com"],
  "data_to_extract": [
    {"field_name": "name", "field_type": "string", "description": "what this field holds"}
  ],
  "success_criteria": "when the agent may stop searching",
  "example_output": {"name": "sample value"}
}
```

## Field Rules

- `search_terms`: at least one concrete query string.
- `target_websites`: bare domains only; leave the list empty when any site will do.
- `data_to_extract`: at least one field; `field_type` must be one of `string`, `number`, `boolean`, `url`, `list`; field names must be unique snake_case identifiers.
- `example_output`: one illustrative record matching `data_to_extract`.

## Success Criteria Guidance

- Keep the bar immediately achievable, e.g. "found at least one relevant item with partial data".
- Favor extracting visible partial data over hunting for perfect matches.
- Never require more than one item or complete data in every field.
"#;

/// Converts a user query into a validated task plan via the
/// text-generation collaborator.
pub struct PlanDrafter {
    generator: Arc<dyn TextGenerator>,
}

impl PlanDrafter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Draft a plan for `query`. One outbound collaborator call; parse or
    /// invariant failures surface as errors rather than fallback plans.
    pub async fn draft(&self, query: &str) -> Result<TaskPlan, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::plan_generation("research query cannot be empty"));
        }

        let request = GenerationRequest::new(PLAN_SYSTEM_PROMPT, build_user_prompt(query));
        let raw = self.generator.generate(&request).await?;

        let json = extract_json_object(&raw).ok_or_else(|| {
            CoreError::plan_generation("response contained no JSON task configuration")
        })?;
        let payload: PlanPayload = serde_json::from_str(&json).map_err(|err| {
            CoreError::plan_generation(format!("failed to parse task configuration: {err}"))
        })?;

        let plan = plan_from_payload(payload)?;
        debug!(
            target: "drafter",
            task = %plan.task_name,
            fields = plan.data_to_extract.len(),
            "task plan drafted"
        );
        Ok(plan)
    }
}

fn build_user_prompt(query: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Research Request\n");
    prompt.push_str(query);
    prompt.push('\n');
    prompt.push_str(
        "\nGenerate the task configuration for this request. \
         Keep the success criteria flexible, prefer partial data over perfect matches, \
         and use field types only from the allowed vocabulary.\n",
    );
    prompt
}

/// Raw plan shape as returned by the collaborator, before invariants apply.
#[derive(Debug, Deserialize)]
struct PlanPayload {
    #[serde(default)]
    task_name: String,
    #[serde(default)]
    search_terms: Vec<String>,
    #[serde(default)]
    target_websites: Vec<String>,
    #[serde(default)]
    data_to_extract: Vec<FieldPayload>,
    #[serde(default)]
    success_criteria: String,
    #[serde(default)]
    example_output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FieldPayload {
    #[serde(default)]
    field_name: String,
    #[serde(default)]
    field_type: String,
    #[serde(default)]
    description: String,
}

fn plan_from_payload(payload: PlanPayload) -> Result<TaskPlan, CoreError> {
    if payload.task_name.trim().is_empty() {
        return Err(CoreError::plan_generation("plan response missing task_name"));
    }
    if payload.success_criteria.trim().is_empty() {
        return Err(CoreError::plan_generation(
            "plan response missing success_criteria",
        ));
    }
    // A syntactically valid but semantically empty plan is a schema
    // problem, not a parse problem.
    if payload.data_to_extract.is_empty() {
        return Err(CoreError::schema_definition(
            "plan response declared no fields to extract",
        ));
    }

    let mut descriptors = Vec::with_capacity(payload.data_to_extract.len());
    for field in &payload.data_to_extract {
        let field_type = FieldType::parse(&field.field_type)?;
        descriptors.push(FieldDescriptor::new(
            field.field_name.trim(),
            field_type,
            field.description.trim(),
        ));
    }

    let mut plan = TaskPlan::new(
        payload.task_name,
        payload.search_terms,
        payload.target_websites,
        descriptors,
        payload.success_criteria,
    )?;
    if let Some(example) = payload.example_output {
        plan = plan.with_example_output(example);
    }
    Ok(plan)
}
