//! Run orchestrator: drives one research run through its stages and owns
//! the only mutable state in the pipeline.
//!
//! Stage order is fixed: Drafting, Composing, Executing, Validating, Done.
//! Any error aborts the run; a run that produced no records still reaches
//! Done with a failure verdict.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use fieldscout_core_types::{PlanId, RunId};

use crate::drafter::PlanDrafter;
use crate::errors::CoreError;
use crate::instructions::{compose, AGENT_TIME_BUDGET_SECS};
use crate::llm::TextGenerator;
use crate::plan::TaskPlan;
use crate::record::RunResult;
use crate::schema::RecordSchema;
use crate::validator::evaluate;

/// Lifecycle stage of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    #[default]
    Idle,
    Drafting,
    Composing,
    Executing,
    Validating,
    Done,
    Aborted,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Drafting => "drafting",
            Self::Composing => "composing",
            Self::Executing => "executing",
            Self::Validating => "validating",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

/// Collaborator that carries out a composed brief and returns raw JSON.
#[async_trait]
pub trait AutomationAgent: Send + Sync {
    async fn execute(&self, instructions: &str) -> Result<Value, CoreError>;
}

/// Canned automation agent for offline runs and tests.
pub struct MockAutomationAgent {
    response: Option<Value>,
    failure: Option<String>,
    last_instructions: StdMutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockAutomationAgent {
    /// Agent that answers every brief with `response`.
    pub fn returning(response: Value) -> Self {
        Self {
            response: Some(response),
            failure: None,
            last_instructions: StdMutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Agent that fails every brief with an [`CoreError::AgentTransport`].
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: None,
            failure: Some(message.into()),
            last_instructions: StdMutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The brief received on the most recent call, if any.
    pub fn last_instructions(&self) -> Option<String> {
        self.last_instructions
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl AutomationAgent for MockAutomationAgent {
    async fn execute(&self, instructions: &str) -> Result<Value, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_instructions.lock() {
            *guard = Some(instructions.to_string());
        }
        if let Some(message) = &self.failure {
            return Err(CoreError::agent_transport(message.clone()));
        }
        match &self.response {
            Some(value) => Ok(value.clone()),
            None => Ok(Value::Null),
        }
    }
}

/// Where and how to reach a browser-automation agent over HTTP.
#[derive(Clone, Debug)]
pub struct HttpAgentConfig {
    pub endpoint: Url,
    pub timeout: Duration,
}

impl HttpAgentConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(AGENT_TIME_BUDGET_SECS),
        }
    }
}

/// Automation agent reached over HTTP. The endpoint receives the brief as
/// `{"instructions": "..."}` and replies with the research envelope.
pub struct HttpAutomationAgent {
    client: reqwest::Client,
    config: HttpAgentConfig,
}

impl HttpAutomationAgent {
    pub fn new(config: HttpAgentConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                CoreError::agent_transport(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AutomationAgent for HttpAutomationAgent {
    async fn execute(&self, instructions: &str) -> Result<Value, CoreError> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .json(&json!({ "instructions": instructions }))
            .send()
            .await
            .map_err(|err| CoreError::agent_transport(format!("agent request failed: {err}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            CoreError::agent_transport(format!("failed to read agent response: {err}"))
        })?;
        if !status.is_success() {
            return Err(CoreError::agent_transport(format!(
                "automation agent returned {status}: {body}"
            )));
        }

        // A non-JSON body is still a reply; the validator decides
        // whether it is usable.
        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(body)),
        }
    }
}

/// Per-run knobs.
#[derive(Clone, Copy, Debug)]
pub struct RunConfig {
    /// Total drafting attempts before the run gives up. Only drafting-side
    /// failures are retried; agent and validation failures never are.
    pub max_attempts: u32,
    /// Wall-clock budget for the agent execution stage.
    pub agent_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            agent_timeout: Duration::from_secs(AGENT_TIME_BUDGET_SECS),
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    stage: RunStage,
    cancelled: bool,
}

/// Everything a finished run produced, ready to render or persist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub plan_id: PlanId,
    pub query: String,
    pub plan: TaskPlan,
    pub instructions: String,
    pub result: RunResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_complete: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives runs end to end. Collaborators are injected behind traits so the
/// whole pipeline runs offline against mocks.
pub struct RunOrchestrator {
    drafter: PlanDrafter,
    agent: Arc<dyn AutomationAgent>,
    config: RunConfig,
    state: Mutex<RunState>,
}

impl RunOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, agent: Arc<dyn AutomationAgent>) -> Self {
        Self {
            drafter: PlanDrafter::new(generator),
            agent,
            config: RunConfig::default(),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Current lifecycle stage.
    pub async fn stage(&self) -> RunStage {
        self.state.lock().await.stage
    }

    /// Request cancellation. One-shot: the next stage boundary that
    /// observes the request consumes it and aborts that run.
    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        state.cancelled = true;
        info!(target: "orchestrator", "cancellation requested");
    }

    /// Run the full pipeline for `query`.
    pub async fn run(&self, query: &str) -> Result<RunReport, CoreError> {
        let mut attempt = 1u32;
        loop {
            match self.run_once(query).await {
                Ok(report) => return Ok(report),
                Err(err) if err.is_drafting_failure() && attempt < self.config.max_attempts => {
                    warn!(
                        target: "orchestrator",
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "drafting failed; retrying with a fresh plan"
                    );
                    attempt += 1;
                }
                Err(err) => {
                    self.abort(&err).await;
                    return Err(err);
                }
            }
        }
    }

    async fn run_once(&self, query: &str) -> Result<RunReport, CoreError> {
        let started_at = Utc::now();
        let run_id = RunId::new();
        let plan_id = PlanId::new();

        if self.cancellation_requested().await {
            return Err(CoreError::cancelled("run cancelled before drafting"));
        }

        self.enter(RunStage::Drafting).await;
        let plan = self.drafter.draft(query).await?;
        info!(
            target: "orchestrator",
            run = %run_id,
            task = %plan.task_name,
            fields = plan.data_to_extract.len(),
            "task plan drafted"
        );

        self.enter(RunStage::Composing).await;
        let schema = RecordSchema::synthesize(&plan.data_to_extract)?;
        let instructions = compose(&plan);

        if self.cancellation_requested().await {
            return Err(CoreError::cancelled("run cancelled before execution"));
        }

        self.enter(RunStage::Executing).await;
        let raw_output =
            match timeout(self.config.agent_timeout, self.agent.execute(&instructions)).await {
                Ok(executed) => executed?,
                Err(_) => {
                    return Err(CoreError::agent_transport(format!(
                        "automation agent timed out after {}s",
                        self.config.agent_timeout.as_secs()
                    )));
                }
            };

        self.enter(RunStage::Validating).await;
        let result = evaluate(&raw_output, &plan, &schema)?;
        let (search_summary, search_complete) = envelope_meta(&raw_output);

        self.enter(RunStage::Done).await;
        info!(
            target: "orchestrator",
            run = %run_id,
            status = result.status.as_str(),
            records = result.records.len(),
            "run complete"
        );

        Ok(RunReport {
            run_id,
            plan_id,
            query: query.trim().to_string(),
            plan,
            instructions,
            result,
            search_summary,
            search_complete,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn enter(&self, stage: RunStage) {
        let mut state = self.state.lock().await;
        state.stage = stage;
        debug!(target: "orchestrator", stage = stage.as_str(), "stage transition");
    }

    async fn cancellation_requested(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.cancelled {
            state.cancelled = false;
            return true;
        }
        false
    }

    async fn abort(&self, err: &CoreError) {
        warn!(
            target: "orchestrator",
            reason = err.telemetry_label(),
            error = %err,
            "run aborted"
        );
        self.state.lock().await.stage = RunStage::Aborted;
    }
}

/// Pull the agent's own summary fields out of the raw envelope, if present.
pub fn envelope_meta(raw: &Value) -> (Option<String>, Option<bool>) {
    let Some(map) = raw.as_object() else {
        return (None, None);
    };
    let summary = map
        .get("search_summary")
        .and_then(Value::as_str)
        .map(str::to_string);
    let complete = map.get("search_complete").and_then(Value::as_bool);
    (summary, complete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationRequest, MockTextGenerator};
    use crate::record::RunStatus;

    fn plan_json() -> &'static str {
        r#"{
            "task_name": "socks_search",
            "search_terms": ["wool socks"],
            "data_to_extract": [
                {"field_name": "name", "field_type": "string", "description": "Item name"}
            ],
            "success_criteria": "found one item"
        }"#
    }

    fn orchestrator_with(
        agent: Arc<MockAutomationAgent>,
    ) -> (RunOrchestrator, Arc<MockTextGenerator>) {
        let generator = Arc::new(MockTextGenerator::scripted([plan_json()]));
        (
            RunOrchestrator::new(generator.clone(), agent),
            generator,
        )
    }

    #[tokio::test]
    async fn successful_run_ends_in_done() {
        let agent = Arc::new(MockAutomationAgent::returning(json!({
            "found_items": [{"name": "merino crew socks"}],
            "search_summary": "searched two shops",
            "search_complete": true
        })));
        let (orchestrator, _) = orchestrator_with(agent.clone());

        let report = orchestrator.run("find wool socks").await.unwrap();
        assert_eq!(orchestrator.stage().await, RunStage::Done);
        assert_eq!(report.result.status, RunStatus::Success);
        assert_eq!(report.search_summary.as_deref(), Some("searched two shops"));
        assert_eq!(report.search_complete, Some(true));
        assert_eq!(agent.call_count(), 1);
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn cancel_is_observed_before_drafting() {
        let agent = Arc::new(MockAutomationAgent::returning(json!({"found_items": []})));
        let (orchestrator, generator) = orchestrator_with(agent.clone());

        orchestrator.cancel().await;
        let err = orchestrator.run("find wool socks").await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled(_)));
        assert_eq!(generator.call_count(), 0);
        assert_eq!(agent.call_count(), 0);
        assert_eq!(orchestrator.stage().await, RunStage::Aborted);
    }

    /// Replays one plan but requests cancellation before handing it back,
    /// so the flag is raised while the run is mid-draft.
    struct CancellingGenerator {
        inner: MockTextGenerator,
        orchestrator: StdMutex<Option<Arc<RunOrchestrator>>>,
    }

    impl CancellingGenerator {
        fn new() -> Self {
            Self {
                inner: MockTextGenerator::scripted([plan_json()]),
                orchestrator: StdMutex::new(None),
            }
        }

        fn arm(&self, orchestrator: Arc<RunOrchestrator>) {
            if let Ok(mut slot) = self.orchestrator.lock() {
                *slot = Some(orchestrator);
            }
        }
    }

    #[async_trait]
    impl TextGenerator for CancellingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, CoreError> {
            let target = self.orchestrator.lock().ok().and_then(|slot| slot.clone());
            if let Some(orchestrator) = target {
                orchestrator.cancel().await;
            }
            self.inner.generate(request).await
        }
    }

    #[tokio::test]
    async fn cancel_during_drafting_stops_before_the_agent_runs() {
        let agent = Arc::new(MockAutomationAgent::returning(json!({"found_items": []})));
        let generator = Arc::new(CancellingGenerator::new());
        let orchestrator = Arc::new(RunOrchestrator::new(generator.clone(), agent.clone()));
        generator.arm(orchestrator.clone());

        let err = orchestrator.run("find wool socks").await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled(_)));
        assert!(err.to_string().contains("before execution"));
        // Drafting finished, but the agent was never reached.
        assert_eq!(generator.inner.call_count(), 1);
        assert_eq!(agent.call_count(), 0);
        assert_eq!(orchestrator.stage().await, RunStage::Aborted);
    }

    #[tokio::test]
    async fn agent_failure_aborts_without_retry() {
        let agent = Arc::new(MockAutomationAgent::failing("bridge unreachable"));
        let generator = Arc::new(MockTextGenerator::scripted([plan_json(), plan_json()]));
        let orchestrator = RunOrchestrator::new(generator.clone(), agent.clone()).with_config(
            RunConfig {
                max_attempts: 3,
                ..RunConfig::default()
            },
        );

        let err = orchestrator.run("find wool socks").await.unwrap_err();
        assert!(matches!(err, CoreError::AgentTransport(_)));
        // Agent failures are not drafting failures, so one attempt only.
        assert_eq!(generator.call_count(), 1);
        assert_eq!(agent.call_count(), 1);
        assert_eq!(orchestrator.stage().await, RunStage::Aborted);
    }

    struct SlowAgent;

    #[async_trait]
    impl AutomationAgent for SlowAgent {
        async fn execute(&self, _instructions: &str) -> Result<Value, CoreError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn slow_agent_hits_the_stage_timeout() {
        let generator = Arc::new(MockTextGenerator::scripted([plan_json()]));
        let orchestrator =
            RunOrchestrator::new(generator, Arc::new(SlowAgent)).with_config(RunConfig {
                max_attempts: 1,
                agent_timeout: Duration::from_millis(20),
            });

        let err = orchestrator.run("find wool socks").await.unwrap_err();
        assert!(matches!(err, CoreError::AgentTransport(_)));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(orchestrator.stage().await, RunStage::Aborted);
    }

    #[test]
    fn envelope_meta_reads_only_well_typed_fields() {
        let raw = json!({
            "found_items": [],
            "search_summary": "looked around",
            "search_complete": "yes"
        });
        let (summary, complete) = envelope_meta(&raw);
        assert_eq!(summary.as_deref(), Some("looked around"));
        assert_eq!(complete, None);
    }

    #[test]
    fn stage_labels_are_snake_case() {
        assert_eq!(RunStage::default(), RunStage::Idle);
        assert_eq!(
            serde_json::to_string(&RunStage::Validating).unwrap(),
            "\"validating\""
        );
        assert_eq!(RunStage::Aborted.as_str(), "aborted");
    }
}
