//! End-to-end pipeline tests against the bundled mock collaborators.

use std::sync::Arc;

use serde_json::json;

use research_core::{
    CoreError, MockAutomationAgent, MockTextGenerator, RunConfig, RunOrchestrator, RunStage,
    RunStatus,
};

fn laptop_plan_response() -> String {
    let plan = r#"{
        "task_name": "laptop_search",
        "search_terms": ["acer laptop under $1000"],
        "target_websites": ["newegg.com"],
        "data_to_extract": [
            {"field_name": "laptop_name", "field_type": "string", "description": "Model name"},
            {"field_name": "price", "field_type": "string", "description": "Listed price"},
            {"field_name": "link", "field_type": "url", "description": "Product page URL"}
        ],
        "success_criteria": "found at least one laptop with a visible price"
    }"#;
    format!("```json\n{plan}\n```")
}

#[tokio::test]
async fn query_to_report_happy_path() {
    let generator = Arc::new(MockTextGenerator::scripted([laptop_plan_response()]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({
        "found_items": [
            {"title": "Acer Aspire 5", "price": "$699.99", "url": "https://example.com/aspire-5"},
            {"title": "Acer Swift 3", "price": "$849.00", "url": "https://example.com/swift-3"}
        ],
        "search_summary": "searched newegg for acer laptops",
        "search_complete": true
    })));
    let orchestrator = RunOrchestrator::new(generator.clone(), agent.clone());

    let report = orchestrator
        .run("find an acer laptop under $1000")
        .await
        .expect("run succeeds");

    assert_eq!(orchestrator.stage().await, RunStage::Done);
    assert_eq!(report.result.status, RunStatus::Success);
    assert_eq!(report.result.records.len(), 2);
    assert_eq!(
        report.result.records[0].get("laptop_name"),
        Some(&json!("Acer Aspire 5"))
    );
    assert_eq!(
        report.search_summary.as_deref(),
        Some("searched newegg for acer laptops")
    );
    assert_eq!(report.search_complete, Some(true));
    assert_eq!(report.plan.task_name, "laptop_search");
    assert!(!report.run_id.0.is_empty());
    assert_eq!(generator.call_count(), 1);
    assert_eq!(agent.call_count(), 1);
}

#[tokio::test]
async fn brief_delivered_to_the_agent_names_every_field() {
    let generator = Arc::new(MockTextGenerator::scripted([laptop_plan_response()]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({"found_items": []})));
    let orchestrator = RunOrchestrator::new(generator, agent.clone());

    orchestrator
        .run("find an acer laptop under $1000")
        .await
        .expect("run completes");

    let brief = agent.last_instructions().expect("agent was called");
    for name in ["laptop_name", "price", "link"] {
        assert!(brief.contains(name), "brief is missing field {name}");
    }
    assert!(brief.contains("newegg.com"));
    assert!(brief.contains("found_items"));
}

#[tokio::test]
async fn drafting_failure_aborts_before_the_agent_runs() {
    let generator = Arc::new(MockTextGenerator::scripted(["no json here, sorry"]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({"found_items": []})));
    let orchestrator = RunOrchestrator::new(generator, agent.clone());

    let err = orchestrator.run("find anything").await.unwrap_err();
    assert!(matches!(err, CoreError::PlanGeneration(_)));
    assert_eq!(agent.call_count(), 0);
    assert_eq!(orchestrator.stage().await, RunStage::Aborted);
}

#[tokio::test]
async fn empty_results_still_reach_done_with_a_failure_verdict() {
    let generator = Arc::new(MockTextGenerator::scripted([laptop_plan_response()]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({
        "found_items": [],
        "search_summary": "no laptops under budget",
        "search_complete": false
    })));
    let orchestrator = RunOrchestrator::new(generator, agent);

    let report = orchestrator.run("find an acer laptop").await.expect("run completes");
    assert_eq!(orchestrator.stage().await, RunStage::Done);
    assert_eq!(report.result.status, RunStatus::Failure);
    assert!(report.result.records.is_empty());
    assert_eq!(report.search_complete, Some(false));
}

#[tokio::test]
async fn prose_agent_output_aborts_as_malformed() {
    let generator = Arc::new(MockTextGenerator::scripted([laptop_plan_response()]));
    let agent = Arc::new(MockAutomationAgent::returning(json!(
        "I browsed around but could not find anything."
    )));
    let orchestrator = RunOrchestrator::new(generator, agent);

    let err = orchestrator.run("find an acer laptop").await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedOutput(_)));
    assert_eq!(orchestrator.stage().await, RunStage::Aborted);
}

#[tokio::test]
async fn drafting_retries_use_a_fresh_generation_each_time() {
    let generator = Arc::new(MockTextGenerator::scripted([
        "garbage, not a plan".to_string(),
        laptop_plan_response(),
    ]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({
        "found_items": [{"title": "Acer Aspire 5", "price": "$699.99", "url": "https://example.com/a"}]
    })));
    let orchestrator = RunOrchestrator::new(generator.clone(), agent).with_config(RunConfig {
        max_attempts: 2,
        ..RunConfig::default()
    });

    let report = orchestrator.run("find an acer laptop").await.expect("second attempt succeeds");
    assert_eq!(report.result.status, RunStatus::Success);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_drafting_error() {
    let generator = Arc::new(MockTextGenerator::scripted(["nope", "still nope"]));
    let agent = Arc::new(MockAutomationAgent::returning(json!({"found_items": []})));
    let orchestrator = RunOrchestrator::new(generator.clone(), agent.clone()).with_config(
        RunConfig {
            max_attempts: 2,
            ..RunConfig::default()
        },
    );

    let err = orchestrator.run("find anything").await.unwrap_err();
    assert!(matches!(err, CoreError::PlanGeneration(_)));
    assert_eq!(generator.call_count(), 2);
    assert_eq!(agent.call_count(), 0);
    assert_eq!(orchestrator.stage().await, RunStage::Aborted);
}
