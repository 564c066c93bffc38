//! Drive a user interface toward a natural-language goal, one observed,
//! planned and executed step at a time.

pub mod agent;
pub mod brain;
pub mod config;
pub mod dom;
pub mod error;
pub mod executor;
pub mod hands;
pub mod trace;
pub mod types;

pub use agent::{AgentLoop, Termination, run_web_task};
pub use brain::{Planner, PlannerKind, build_planner};
pub use config::Config;
pub use error::{AgentError, ExecError, RunError, SchemaError};
pub use executor::{Executor, Platform, WebExecutor};
pub use types::{Action, ArgValue, Observation, Target, TargetBy, Tool, action_to_map};
