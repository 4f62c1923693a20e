//! Wires configuration into collaborators and runs the research pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;
use url::Url;

use research_core::{
    AutomationAgent, HttpAgentConfig, HttpAutomationAgent, MockAutomationAgent,
    MockTextGenerator, OpenAiConfig, OpenAiTextGenerator, RunConfig, RunOrchestrator, RunReport,
    TextGenerator,
};

use crate::config::{AppConfig, AGENT_ENDPOINT_ENV};

/// How collaborators are sourced for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// OpenAI drafting plus the HTTP automation agent.
    Online,
    /// Canned collaborators; no network traffic at all.
    Offline,
}

pub struct App {
    config: AppConfig,
    mode: RunMode,
}

impl App {
    pub fn new(config: AppConfig, mode: RunMode) -> Self {
        Self { config, mode }
    }

    /// Run one research query end to end.
    pub async fn run(&self, query: &str) -> Result<RunReport> {
        let (generator, agent) = match self.mode {
            RunMode::Offline => offline_collaborators(query),
            RunMode::Online => online_collaborators(&self.config)?,
        };

        let run_config = RunConfig {
            max_attempts: self.config.run.max_attempts.max(1),
            agent_timeout: Duration::from_secs(self.config.agent.timeout_secs),
        };
        let orchestrator = RunOrchestrator::new(generator, agent).with_config(run_config);

        orchestrator.run(query).await.context("research run failed")
    }
}

/// Canned collaborators: a single-response plan generator seeded with the
/// query and an agent that browses nothing.
fn offline_collaborators(query: &str) -> (Arc<dyn TextGenerator>, Arc<dyn AutomationAgent>) {
    let plan = json!({
        "task_name": "offline_research",
        "search_terms": [query],
        "data_to_extract": [
            {"field_name": "title", "field_type": "string", "description": "Result title"},
            {"field_name": "url", "field_type": "url", "description": "Result URL"},
            {"field_name": "snippet", "field_type": "string", "description": "Short excerpt"}
        ],
        "success_criteria": "found at least one relevant item"
    });
    let generator = MockTextGenerator::scripted([plan.to_string()]);
    let agent = MockAutomationAgent::returning(json!({
        "found_items": [],
        "search_summary": "offline mode: no browsing performed",
        "search_complete": false
    }));
    (Arc::new(generator), Arc::new(agent))
}

fn online_collaborators(
    config: &AppConfig,
) -> Result<(Arc<dyn TextGenerator>, Arc<dyn AutomationAgent>)> {
    let llm_config = OpenAiConfig {
        api_keys: config.llm.api_keys.clone(),
        model: config.llm.model.clone(),
        api_base: config.llm.api_base.clone(),
        temperature: config.llm.temperature,
        timeout: Duration::from_secs(config.llm.timeout_secs),
    };
    let generator =
        OpenAiTextGenerator::new(llm_config).context("failed to build text generator")?;

    let Some(endpoint) = &config.agent.endpoint else {
        bail!(
            "no automation agent endpoint configured; set {AGENT_ENDPOINT_ENV} or pass --agent-endpoint"
        );
    };
    let endpoint = Url::parse(endpoint)
        .with_context(|| format!("invalid agent endpoint '{endpoint}'"))?;
    let mut agent_config = HttpAgentConfig::new(endpoint);
    agent_config.timeout = Duration::from_secs(config.agent.timeout_secs);
    let agent =
        HttpAutomationAgent::new(agent_config).context("failed to build automation agent")?;

    Ok((Arc::new(generator), Arc::new(agent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::RunStatus;

    #[tokio::test]
    async fn offline_run_completes_without_network() {
        let app = App::new(AppConfig::default(), RunMode::Offline);
        let report = app.run("find rust conferences in 2026").await.unwrap();
        assert_eq!(report.result.status, RunStatus::Failure);
        assert_eq!(report.plan.task_name, "offline_research");
        assert_eq!(
            report.plan.search_terms,
            vec!["find rust conferences in 2026"]
        );
        assert_eq!(report.search_complete, Some(false));
        assert!(report.result.records.is_empty());
    }

    #[tokio::test]
    async fn online_mode_requires_an_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_keys.clear();
        let app = App::new(config, RunMode::Online);
        let err = app.run("anything").await.unwrap_err();
        assert!(format!("{err:#}").contains("no API key"));
    }

    #[tokio::test]
    async fn online_mode_requires_an_agent_endpoint() {
        let mut config = AppConfig::default();
        config.llm.api_keys.push("sk-test".into());
        config.agent.endpoint = None;
        let app = App::new(config, RunMode::Online);
        let err = app.run("anything").await.unwrap_err();
        assert!(format!("{err:#}").contains("agent endpoint"));
    }

    #[tokio::test]
    async fn bad_agent_endpoint_is_rejected_up_front() {
        let mut config = AppConfig::default();
        config.llm.api_keys.push("sk-test".into());
        config.agent.endpoint = Some("not a url".into());
        let app = App::new(config, RunMode::Online);
        let err = app.run("anything").await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid agent endpoint"));
    }
}
