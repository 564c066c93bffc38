//! Executors turn one [`Action`] into input events on a concrete platform.
//!
//! Only the web executor does anything. Desktop and mobile are declared so
//! the rest of the crate can name them, and refuse every call.

use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use strum::Display;
use tracing::{debug, warn};

use crate::config::Timings;
use crate::error::{AgentError, BackendError, ExecError};
use crate::hands::Backend;
use crate::types::{Action, ArgValue, Observation, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Web,
    Desktop,
    Android,
    Ios,
}

impl Platform {
    /// Fails for every platform without a real executor.
    pub fn ensure_implemented(self) -> Result<(), AgentError> {
        match self {
            Platform::Web => Ok(()),
            Platform::Desktop => Err(AgentError::NotImplemented(
                "desktop executor (UIA / AX / AT-SPI) is a placeholder".into(),
            )),
            Platform::Android | Platform::Ios => Err(AgentError::NotImplemented(format!(
                "{self} executor (uiautomator2 / WDA) is a placeholder"
            ))),
        }
    }
}

/// What a single dispatch amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Input events were sent.
    Performed,
    /// Nothing to act on; the step is a no-op.
    NoOp,
    /// A plain pause.
    Waited,
    /// Result of waiting for a locator.
    Visible(bool),
}

#[async_trait]
pub trait Executor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Capture the current state. Capture failures leave fields empty.
    async fn observe(&self, goal: &str) -> Observation;

    async fn execute(&self, action: &Action) -> Result<Outcome, ExecError>;

    /// The early-success check: the action carries an assertion and its own
    /// target locator shows up.
    async fn assertion_holds(&self, action: &Action) -> Result<bool, ExecError>;
}

pub struct WebExecutor<B: ?Sized> {
    backend: Arc<B>,
    timings: Timings,
}

impl<B: Backend + ?Sized> WebExecutor<B> {
    pub fn new(backend: Arc<B>, timings: Timings) -> Self {
        Self { backend, timings }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Wait for a locator the step depends on. Not showing up is a hard failure.
    async fn require_visible(&self, tool: Tool, selector: &str) -> Result<(), ExecError> {
        match self
            .backend
            .wait_visible(selector, self.timings.locator_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::Timeout { .. }) => Err(ExecError::TargetTimeout {
                tool: tool.to_string(),
                selector: selector.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Wait for a locator without failing the step.
    async fn probe_visible(&self, selector: &str, timeout: std::time::Duration) -> bool {
        match self.backend.wait_visible(selector, timeout).await {
            Ok(()) => true,
            Err(e) if e.is_timeout() => false,
            Err(e) => {
                warn!(target: "executor", %selector, "visibility probe failed: {e}");
                false
            }
        }
    }

    async fn click(&self, action: &Action) -> Result<Outcome, ExecError> {
        if let Some(selector) = action.selector() {
            self.require_visible(Tool::Click, selector).await?;
            self.backend.click_selector(selector).await?;
            return Ok(Outcome::Performed);
        }
        match action.target.as_ref().and_then(|t| t.centroid()) {
            Some((x, y)) => {
                self.backend.click_point(x, y).await?;
                Ok(Outcome::Performed)
            }
            None => Ok(Outcome::NoOp),
        }
    }

    async fn type_into(&self, action: &Action) -> Result<Outcome, ExecError> {
        let mut outcome = Outcome::NoOp;

        if let Some(selector) = action.selector() {
            self.require_visible(Tool::Type, selector).await?;
            // Focus is best-effort; keystrokes go to whatever has focus.
            if let Err(e) = self.backend.click_selector(selector).await {
                debug!(target: "executor", %selector, "focus click failed: {e}");
            }
            outcome = Outcome::Performed;
        }
        if let Some(text) = action.input_text.as_deref() {
            self.backend.type_text(text, self.timings.key_delay).await?;
            outcome = Outcome::Performed;
        }
        Ok(outcome)
    }

    async fn scroll(&self, action: &Action) -> Result<Outcome, ExecError> {
        let dy = action
            .arg("deltaY")
            .and_then(ArgValue::as_f64)
            .filter(|d| d.is_finite())
            .unwrap_or(self.timings.default_scroll);
        self.backend.scroll(0.0, dy).await?;
        Ok(Outcome::Performed)
    }

    async fn wait_for(&self, action: &Action) -> Outcome {
        match action.selector() {
            Some(selector) => {
                Outcome::Visible(self.probe_visible(selector, self.timings.locator_timeout).await)
            }
            None => {
                tokio::time::sleep(self.timings.idle_wait).await;
                Outcome::Waited
            }
        }
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Executor for WebExecutor<B> {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn observe(&self, goal: &str) -> Observation {
        let screenshot = match self.backend.screenshot().await {
            Ok(png) => Some(png),
            Err(e) => {
                warn!(target: "executor", "screenshot failed: {e}");
                None
            }
        };
        let snapshot = match self.backend.content().await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(target: "executor", "document capture failed: {e}");
                None
            }
        };
        Observation {
            snapshot,
            screenshot,
            goal: goal.to_string(),
        }
    }

    async fn execute(&self, action: &Action) -> Result<Outcome, ExecError> {
        match action.tool {
            Tool::Click => self.click(action).await,
            Tool::Type => self.type_into(action).await,
            Tool::Scroll => self.scroll(action).await,
            Tool::WaitFor => Ok(self.wait_for(action).await),
            other => {
                debug!(target: "executor", tool = %other, "not a web tool, pausing instead");
                tokio::time::sleep(self.timings.fallback_wait).await;
                Ok(Outcome::NoOp)
            }
        }
    }

    async fn assertion_holds(&self, action: &Action) -> Result<bool, ExecError> {
        let marked = action
            .assertion
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if !marked {
            return Ok(false);
        }
        match action.selector() {
            Some(selector) => Ok(self
                .probe_visible(selector, self.timings.assertion_timeout)
                .await),
            None => Ok(false),
        }
    }
}

/// Placeholder for UIA / AX / AT-SPI automation.
#[derive(Debug, Default)]
pub struct DesktopExecutor;

#[async_trait]
impl Executor for DesktopExecutor {
    fn platform(&self) -> Platform {
        Platform::Desktop
    }

    async fn observe(&self, goal: &str) -> Observation {
        Observation::goal_only(goal)
    }

    async fn execute(&self, _action: &Action) -> Result<Outcome, ExecError> {
        Err(ExecError::NotImplemented("desktop"))
    }

    async fn assertion_holds(&self, _action: &Action) -> Result<bool, ExecError> {
        Err(ExecError::NotImplemented("desktop"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileOs {
    Android,
    Ios,
}

/// Placeholder for Appium-style mobile automation.
#[derive(Debug)]
pub struct MobileExecutor {
    pub os: MobileOs,
}

impl MobileExecutor {
    fn label(&self) -> &'static str {
        match self.os {
            MobileOs::Android => "android",
            MobileOs::Ios => "ios",
        }
    }
}

#[async_trait]
impl Executor for MobileExecutor {
    fn platform(&self) -> Platform {
        match self.os {
            MobileOs::Android => Platform::Android,
            MobileOs::Ios => Platform::Ios,
        }
    }

    async fn observe(&self, goal: &str) -> Observation {
        Observation::goal_only(goal)
    }

    async fn execute(&self, _action: &Action) -> Result<Outcome, ExecError> {
        Err(ExecError::NotImplemented(self.label()))
    }

    async fn assertion_holds(&self, _action: &Action) -> Result<bool, ExecError> {
        Err(ExecError::NotImplemented(self.label()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hands::fake::{Call, FakeBackend};
    use crate::types::Target;

    fn fast() -> Timings {
        Timings {
            idle_wait: Duration::from_millis(1),
            fallback_wait: Duration::from_millis(1),
            ..Timings::default()
        }
    }

    fn executor(backend: FakeBackend) -> WebExecutor<FakeBackend> {
        WebExecutor::new(Arc::new(backend), fast())
    }

    fn click(target: Target) -> Action {
        Action::with_tool(Tool::Click).with_target(target)
    }

    #[tokio::test]
    async fn bbox_click_lands_on_rounded_centroid() {
        let exec = executor(FakeBackend::default());
        let outcome = exec
            .execute(&click(Target::bbox(10.0, 20.0, 31.0, 41.0)))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Performed);
        assert_eq!(exec.backend().calls(), vec![Call::ClickPoint(21, 31)]);
    }

    #[tokio::test]
    async fn bbox_click_stays_in_page_space_after_scrolling() {
        let exec = executor(FakeBackend::default());
        exec.execute(&Action::with_tool(Tool::Scroll).with_arg("deltaY", 1200.0))
            .await
            .unwrap();
        exec.execute(&click(Target::bbox(600.0, 1480.0, 680.0, 1520.0)))
            .await
            .unwrap();

        assert_eq!(
            exec.backend().calls(),
            vec![Call::Scroll(0.0, 1200.0), Call::ClickPoint(640, 1500)]
        );
    }

    #[tokio::test]
    async fn selector_wins_over_bbox() {
        let exec = executor(FakeBackend::with_visible(&["#go"]));
        let target = Target {
            bbox: Some([0.0, 0.0, 10.0, 10.0]),
            ..Target::selector("#go")
        };
        exec.execute(&click(target)).await.unwrap();

        assert_eq!(
            exec.backend().calls(),
            vec![Call::WaitVisible("#go".into()), Call::ClickSelector("#go".into())]
        );
    }

    #[tokio::test]
    async fn invisible_click_target_is_a_hard_failure() {
        let exec = executor(FakeBackend::default());
        let err = exec.execute(&click(Target::selector("#missing"))).await.unwrap_err();

        assert!(matches!(
            err,
            ExecError::TargetTimeout { ref tool, ref selector } if tool == "click" && selector == "#missing"
        ));
        assert!(!exec.backend().calls().contains(&Call::ClickSelector("#missing".into())));
    }

    #[tokio::test]
    async fn click_without_target_is_a_no_op() {
        let exec = executor(FakeBackend::default());
        let outcome = exec.execute(&Action::with_tool(Tool::Click)).await.unwrap();
        assert_eq!(outcome, Outcome::NoOp);

        let outcome = exec.execute(&click(Target::default())).await.unwrap();
        assert_eq!(outcome, Outcome::NoOp);
        assert!(exec.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn type_focuses_then_types_and_ignores_focus_failure() {
        let exec = executor(FakeBackend::with_visible(&["#q"]).failing_clicks());
        let action = Action::with_tool(Tool::Type)
            .with_target(Target::selector("#q"))
            .with_input_text("rust lang");

        let outcome = exec.execute(&action).await.unwrap();
        assert_eq!(outcome, Outcome::Performed);
        assert_eq!(
            exec.backend().calls(),
            vec![
                Call::WaitVisible("#q".into()),
                Call::ClickSelector("#q".into()),
                Call::Type("rust lang".into()),
            ]
        );
    }

    #[tokio::test]
    async fn type_into_invisible_target_fails_and_types_nothing() {
        let exec = executor(FakeBackend::default());
        let action = Action::with_tool(Tool::Type)
            .with_target(Target::selector("#q"))
            .with_input_text("x");

        assert!(exec.execute(&action).await.is_err());
        assert!(!exec.backend().calls().contains(&Call::Type("x".into())));
    }

    #[tokio::test]
    async fn type_without_target_or_text_is_a_no_op() {
        let exec = executor(FakeBackend::default());
        let outcome = exec.execute(&Action::with_tool(Tool::Type)).await.unwrap();
        assert_eq!(outcome, Outcome::NoOp);

        let outcome = exec
            .execute(&Action::with_tool(Tool::Type).with_input_text("hi"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Performed);
        assert_eq!(exec.backend().calls(), vec![Call::Type("hi".into())]);
    }

    #[tokio::test]
    async fn scroll_uses_delta_or_default() {
        let exec = executor(FakeBackend::default());
        exec.execute(&Action::with_tool(Tool::Scroll)).await.unwrap();
        exec.execute(&Action::with_tool(Tool::Scroll).with_arg("deltaY", -250.0))
            .await
            .unwrap();
        exec.execute(&Action::with_tool(Tool::Scroll).with_arg("deltaY", f64::NAN))
            .await
            .unwrap();
        exec.execute(&Action::with_tool(Tool::Scroll).with_arg("deltaY", "lots"))
            .await
            .unwrap();

        assert_eq!(
            exec.backend().calls(),
            vec![
                Call::Scroll(0.0, 600.0),
                Call::Scroll(0.0, -250.0),
                Call::Scroll(0.0, 600.0),
                Call::Scroll(0.0, 600.0),
            ]
        );
    }

    #[tokio::test]
    async fn wait_for_reports_visibility_without_failing() {
        let exec = executor(FakeBackend::with_visible(&["#ready"]));
        let seen = Action::with_tool(Tool::WaitFor).with_target(Target::selector("#ready"));
        let unseen = Action::with_tool(Tool::WaitFor).with_target(Target::selector("#never"));

        assert_eq!(exec.execute(&seen).await.unwrap(), Outcome::Visible(true));
        assert_eq!(exec.execute(&unseen).await.unwrap(), Outcome::Visible(false));
        assert_eq!(
            exec.execute(&Action::with_tool(Tool::WaitFor)).await.unwrap(),
            Outcome::Waited
        );
    }

    #[tokio::test]
    async fn reserved_tools_fall_back_to_a_pause() {
        let exec = executor(FakeBackend::default());
        for tool in [Tool::Back, Tool::Home, Tool::Tap, Tool::AdbShell] {
            let action = Action::with_tool(tool).with_target(Target::bbox(0.0, 0.0, 4.0, 4.0));
            assert_eq!(exec.execute(&action).await.unwrap(), Outcome::NoOp);
        }
        assert!(exec.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn assertion_needs_both_marker_and_visible_selector() {
        let exec = executor(FakeBackend::with_visible(&["#done"]));
        let bare = Action::with_tool(Tool::Click).with_target(Target::selector("#done"));
        let asserted = bare.clone().with_assertion("done");
        let no_locator = Action::with_tool(Tool::Scroll).with_assertion("done");
        let hidden = Action::with_tool(Tool::Click)
            .with_target(Target::selector("#later"))
            .with_assertion("done");

        assert!(!exec.assertion_holds(&bare).await.unwrap());
        assert!(exec.assertion_holds(&asserted).await.unwrap());
        assert!(!exec.assertion_holds(&no_locator).await.unwrap());
        assert!(!exec.assertion_holds(&hidden).await.unwrap());
    }

    #[tokio::test]
    async fn blank_assertion_is_no_assertion() {
        let exec = executor(FakeBackend::with_visible(&["#a"]));
        let clicked = Action::with_tool(Tool::Click).with_target(Target::selector("#a"));

        assert!(!exec.assertion_holds(&clicked.clone().with_assertion("")).await.unwrap());
        assert!(!exec.assertion_holds(&clicked.clone().with_assertion("  ")).await.unwrap());
        assert!(exec.assertion_holds(&clicked.with_assertion("a shown")).await.unwrap());
        assert!(exec.backend().calls().iter().all(|c| *c == Call::WaitVisible("#a".into())));
    }

    #[tokio::test]
    async fn observation_survives_capture_failures() {
        let exec = executor(FakeBackend::default().failing_observation());
        let obs = exec.observe("goal").await;
        assert!(obs.snapshot.is_none());
        assert!(obs.screenshot.is_none());
        assert_eq!(obs.goal, "goal");

        let exec = executor(FakeBackend::default());
        let obs = exec.observe("goal").await;
        assert!(obs.snapshot.unwrap().contains("button"));
        assert!(obs.screenshot.is_some());
    }

    #[tokio::test]
    async fn placeholder_executors_refuse_to_act() {
        let action = Action::with_tool(Tool::Tap);
        let err = DesktopExecutor.execute(&action).await.unwrap_err();
        assert!(matches!(err, ExecError::NotImplemented("desktop")));

        let ios = MobileExecutor { os: MobileOs::Ios };
        assert_eq!(ios.platform(), Platform::Ios);
        assert!(matches!(
            ios.assertion_holds(&action).await,
            Err(ExecError::NotImplemented("ios"))
        ));
    }

    #[test]
    fn only_web_is_implemented() {
        assert!(Platform::Web.ensure_implemented().is_ok());
        for platform in [Platform::Desktop, Platform::Android, Platform::Ios] {
            assert!(matches!(
                platform.ensure_implemented(),
                Err(AgentError::NotImplemented(_))
            ));
        }
    }
}
