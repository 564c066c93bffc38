//! Planners turn one [`Observation`] into one [`Action`].
//!
//! A planner never fails: anything it cannot make sense of becomes
//! [`Action::default_wait`], so the loop simply asks again next step.

pub mod openai;
pub mod pattern;

use async_trait::async_trait;
use clap::ValueEnum;

use crate::config::Config;
use crate::error::AgentError;
use crate::types::{Action, Observation};

pub use openai::OpenAiPlanner;
pub use pattern::PatternPlanner;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, observation: &Observation) -> Action;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlannerKind {
    /// Goal-string patterns, no external calls.
    Simple,
    /// OpenAI-compatible chat completions.
    Openai,
}

impl PlannerKind {
    /// Unknown names select the pattern planner.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("openai") {
            PlannerKind::Openai
        } else {
            PlannerKind::Simple
        }
    }
}

pub fn build_planner(kind: PlannerKind, config: &Config) -> Result<Box<dyn Planner>, AgentError> {
    match kind {
        PlannerKind::Simple => Ok(Box::new(PatternPlanner::new())),
        PlannerKind::Openai => Ok(Box::new(OpenAiPlanner::from_config(config)?)),
    }
}
