//! Instruction composer: renders a [`TaskPlan`] into the markdown brief
//! handed to the automation agent.
//!
//! Composition is pure and deterministic. The same plan always yields the
//! same text, so drafting is the only nondeterministic stage of a run.

use crate::plan::TaskPlan;

/// Step ceiling communicated to the automation agent.
pub const MAX_AGENT_STEPS: u32 = 20;

/// Wall-clock budget communicated to the automation agent, in seconds.
pub const AGENT_TIME_BUDGET_SECS: u64 = 600;

/// Render the agent brief for `plan`.
///
/// Every declared field name appears literally in the output so the agent
/// can echo them back as record keys.
pub fn compose(plan: &TaskPlan) -> String {
    let mut brief = String::new();

    brief.push_str("## Task\n");
    brief.push_str(&plan.task_name);
    brief.push_str("\n\n");

    brief.push_str("## Search Terms\n");
    for term in &plan.search_terms {
        brief.push_str("- ");
        brief.push_str(term);
        brief.push('\n');
    }
    brief.push('\n');

    brief.push_str("## Target Websites\n");
    if plan.is_unrestricted() {
        brief.push_str("Any relevant website may be used.\n");
    } else {
        for site in &plan.target_websites {
            brief.push_str("- ");
            brief.push_str(site);
            brief.push('\n');
        }
    }
    brief.push('\n');

    brief.push_str("## Data To Extract\n");
    for field in &plan.data_to_extract {
        brief.push_str(&format!(
            "- `{}` ({})",
            field.field_name,
            field.field_type.as_str()
        ));
        if !field.description.is_empty() {
            brief.push_str(": ");
            brief.push_str(&field.description);
        }
        brief.push('\n');
    }
    brief.push('\n');

    brief.push_str("## Success Criteria\n");
    brief.push_str(&plan.success_criteria);
    brief.push_str("\n\n");

    brief.push_str("## Response Format\n");
    brief.push_str(
        "Reply with a single JSON object containing a `found_items` array. \
         Each entry must be an object whose keys are exactly the field names \
         listed under Data To Extract. Include a `search_summary` string \
         describing what was searched and a `search_complete` boolean.\n",
    );
    if let Some(example) = &plan.example_output {
        brief.push_str("\nExample record:\n```json\n");
        brief.push_str(&serde_json::to_string_pretty(example).unwrap_or_default());
        brief.push_str("\n```\n");
    }
    brief.push('\n');

    brief.push_str("## Limits\n");
    brief.push_str(&format!(
        "- Use at most {MAX_AGENT_STEPS} browsing steps and {AGENT_TIME_BUDGET_SECS} seconds.\n"
    ));
    brief.push_str(
        "- Record partial data as soon as it is visible rather than continuing to search.\n",
    );
    brief.push_str("- Stop as soon as the success criteria are met.\n");

    brief
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FieldDescriptor, FieldType};

    fn sample_plan() -> TaskPlan {
        TaskPlan::new(
            "laptop_search",
            vec!["acer laptop under $1000".into()],
            vec!["newegg.com".into(), "bestbuy.com".into()],
            vec![
                FieldDescriptor::new("laptop_name", FieldType::String, "Model name"),
                FieldDescriptor::new("price", FieldType::Number, ""),
                FieldDescriptor::new("link", FieldType::Url, "Product page"),
            ],
            "found at least one laptop with a visible price",
        )
        .unwrap()
    }

    #[test]
    fn brief_names_every_declared_field() {
        let plan = sample_plan();
        let brief = compose(&plan);
        for name in plan.field_names() {
            assert!(brief.contains(name), "brief is missing field {name}");
        }
        assert!(brief.contains("found_items"));
        assert!(brief.contains("newegg.com"));
        assert!(brief.contains("found at least one laptop"));
    }

    #[test]
    fn composition_is_deterministic() {
        let plan = sample_plan();
        assert_eq!(compose(&plan), compose(&plan));
    }

    #[test]
    fn unrestricted_plan_says_so() {
        let plan = TaskPlan::new(
            "open_search",
            vec!["rust conferences".into()],
            Vec::new(),
            vec![FieldDescriptor::new("name", FieldType::String, "")],
            "found one conference",
        )
        .unwrap();
        let brief = compose(&plan);
        assert!(brief.contains("Any relevant website may be used."));
    }

    #[test]
    fn example_output_is_rendered_as_fenced_json() {
        let plan = sample_plan().with_example_output(serde_json::json!({
            "laptop_name": "Acer Aspire 5",
            "price": 699.99,
            "link": "https://example.com/aspire-5"
        }));
        let brief = compose(&plan);
        assert!(brief.contains("Example record:"));
        assert!(brief.contains("Acer Aspire 5"));
    }
}
