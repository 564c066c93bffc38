//! The observe → plan → execute loop for one goal.

use std::sync::Arc;

use tracing::{info, warn};

use crate::brain::Planner;
use crate::config::Config;
use crate::error::{AgentError, ExecError, RunError};
use crate::executor::{Executor, WebExecutor};
use crate::hands::{Backend, BrowserSession};
use crate::trace::{self, TraceSink};
use crate::types::action_to_map;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The action at `step` carried an assertion whose target appeared.
    Success { step: usize },
    StepBudgetExhausted { steps: usize },
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Success { step } => write!(f, "success at step {step}"),
            Termination::StepBudgetExhausted { steps } => {
                write!(f, "step budget exhausted after {steps} steps")
            }
        }
    }
}

/// Wires one planner to one executor. Steps run strictly one after another.
pub struct AgentLoop {
    planner: Box<dyn Planner>,
    executor: Box<dyn Executor>,
    trace: Box<dyn TraceSink>,
    max_steps: usize,
}

impl AgentLoop {
    pub fn new(
        planner: Box<dyn Planner>,
        executor: Box<dyn Executor>,
        trace: Box<dyn TraceSink>,
        max_steps: usize,
    ) -> Self {
        Self {
            planner,
            executor,
            trace,
            max_steps,
        }
    }

    pub async fn run(&self, goal: &str) -> Result<Termination, RunError> {
        info!(
            target: "agent",
            planner = self.planner.name(),
            platform = %self.executor.platform(),
            max_steps = self.max_steps,
            "starting run: {goal}"
        );
        self.trace.write_text("goal.txt", goal);

        let result = self.steps(goal).await;
        let summary = match &result {
            Ok(termination) => termination.to_string(),
            Err(e) => format!("failed: {e}"),
        };
        self.trace.write_text("result.txt", &summary);
        result
    }

    async fn steps(&self, goal: &str) -> Result<Termination, RunError> {
        for step in 0..self.max_steps {
            let observation = self.executor.observe(goal).await;
            if let Some(html) = &observation.snapshot {
                self.trace.write_text(&format!("step_{step:02}_dom.html"), html);
            }
            if let Some(png) = &observation.screenshot {
                self.trace
                    .write_binary(&format!("step_{step:02}_screenshot.png"), png);
            }

            let action = self.planner.plan(&observation).await;
            drop(observation);

            info!(
                target: "agent",
                step,
                tool = %action.tool,
                target_desc = %action.target_label(),
                "{}",
                action.rationale.as_deref().unwrap_or("-")
            );
            match serde_json::to_string_pretty(&action_to_map(&action)) {
                Ok(json) => self
                    .trace
                    .write_text(&format!("step_{step:02}_action.json"), &json),
                Err(e) => warn!(target: "agent", "could not serialize action: {e}"),
            }

            let fail = |source: ExecError| RunError::StepFailed {
                step,
                tool: action.tool.to_string(),
                target: action.target_label(),
                source,
            };

            let outcome = self.executor.execute(&action).await.map_err(fail)?;
            tracing::debug!(target: "agent", step, ?outcome, "executed");

            if self.executor.assertion_holds(&action).await.map_err(fail)? {
                info!(target: "agent", step, "assertion satisfied");
                return Ok(Termination::Success { step });
            }
        }

        info!(target: "agent", steps = self.max_steps, "step budget exhausted");
        Ok(Termination::StepBudgetExhausted {
            steps: self.max_steps,
        })
    }
}

/// Launch a browser, open `url`, and drive it toward `goal`.
pub async fn run_web_task(
    url: &str,
    planner: Box<dyn Planner>,
    goal: &str,
    max_steps: usize,
    config: &Config,
) -> Result<Termination, AgentError> {
    let session = Arc::new(BrowserSession::start(config.headless).await?);
    run_with_backend(session, url, planner, goal, max_steps, config).await
}

/// Same as [`run_web_task`] against an already running backend.
pub async fn run_with_backend<B: Backend + 'static>(
    backend: Arc<B>,
    url: &str,
    planner: Box<dyn Planner>,
    goal: &str,
    max_steps: usize,
    config: &Config,
) -> Result<Termination, AgentError> {
    backend.navigate(url).await?;

    let executor = WebExecutor::new(backend, config.timings);
    let trace = trace::open_or_null(&config.trace_dir);
    let agent = AgentLoop::new(planner, Box::new(executor), trace, max_steps);
    Ok(agent.run(goal).await?)
}
