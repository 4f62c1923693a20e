//! Core research pipeline: plan drafting, schema synthesis, instruction
//! composition, result validation, and run orchestration.
//!
//! The pipeline turns one natural-language query into a structured
//! [`TaskPlan`], renders it as a deterministic agent brief, hands the brief
//! to a browser-automation collaborator, and validates whatever comes back
//! into typed [`ExtractionRecord`]s with a three-way verdict.
//!
//! External collaborators sit behind the [`TextGenerator`] and
//! [`AutomationAgent`] traits, so everything here runs offline against the
//! bundled mocks.

pub mod drafter;
pub mod errors;
pub mod instructions;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod record;
pub mod schema;
pub mod validator;

pub use drafter::{PlanDrafter, PLAN_SYSTEM_PROMPT};
pub use errors::CoreError;
pub use instructions::{compose, AGENT_TIME_BUDGET_SECS, MAX_AGENT_STEPS};
pub use llm::{
    GenerationRequest, MockTextGenerator, OpenAiConfig, OpenAiTextGenerator, TextGenerator,
};
pub use orchestrator::{
    envelope_meta, AutomationAgent, HttpAgentConfig, HttpAutomationAgent, MockAutomationAgent,
    RunConfig, RunOrchestrator, RunReport, RunStage,
};
pub use plan::{FieldDescriptor, FieldType, TaskPlan};
pub use record::{ExtractionRecord, RunResult, RunStatus};
pub use schema::RecordSchema;
pub use validator::evaluate;
