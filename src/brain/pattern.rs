use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use super::Planner;
use crate::types::{Action, Observation, Target, Tool};

/// Deterministic planner for demos and tests. Understands three goal shapes,
/// tried in this order:
///
/// - `type selector=<S> text=<T>`
/// - `click selector=<S>`
/// - `wait_for selector=<S>`
pub struct PatternPlanner {
    type_re: Regex,
    click_re: Regex,
    wait_re: Regex,
}

impl PatternPlanner {
    pub fn new() -> Self {
        Self {
            type_re: pattern(r"type\s+selector=(?P<sel>\S+)\s+text=(?P<txt>.+)"),
            click_re: pattern(r"click\s+selector=(?P<sel>\S+)"),
            wait_re: pattern(r"wait_for\s+selector=(?P<sel>\S+)"),
        }
    }

    pub fn decide(&self, goal: &str) -> Action {
        if let Some(caps) = self.type_re.captures(goal) {
            return Action::with_tool(Tool::Type)
                .with_target(Target::selector(&caps["sel"]))
                .with_input_text(&caps["txt"])
                .with_rationale("Typing requested by goal");
        }
        if let Some(caps) = self.click_re.captures(goal) {
            return Action::with_tool(Tool::Click)
                .with_target(Target::selector(&caps["sel"]))
                .with_rationale("Click requested by goal");
        }
        if let Some(caps) = self.wait_re.captures(goal) {
            return Action::with_tool(Tool::WaitFor)
                .with_target(Target::selector(&caps["sel"]))
                .with_rationale("Wait requested by goal");
        }
        Action::default_wait("No matching pattern; waiting")
    }
}

impl Default for PatternPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for PatternPlanner {
    async fn plan(&self, observation: &Observation) -> Action {
        self.decide(&observation.goal)
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}

// The patterns are literals; a failure here is a programming error.
fn pattern(re: &str) -> Regex {
    RegexBuilder::new(re)
        .case_insensitive(true)
        .build()
        .expect("static planner pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(goal: &str) -> Action {
        PatternPlanner::new().decide(goal)
    }

    #[test]
    fn type_goal_yields_type_action() {
        let action = plan("type selector=#q text=hello world");
        assert_eq!(action.tool, Tool::Type);
        assert_eq!(action.selector(), Some("#q"));
        assert_eq!(action.input_text.as_deref(), Some("hello world"));
    }

    #[test]
    fn type_wins_over_embedded_click() {
        // The text payload itself contains a click pattern.
        let action = plan("type selector=input.search text=click selector=#buy");
        assert_eq!(action.tool, Tool::Type);
        assert_eq!(action.selector(), Some("input.search"));
        assert_eq!(action.input_text.as_deref(), Some("click selector=#buy"));
    }

    #[test]
    fn click_and_wait_patterns() {
        let click = plan("please CLICK Selector=button.primary now");
        assert_eq!(click.tool, Tool::Click);
        assert_eq!(click.selector(), Some("button.primary"));

        let wait = plan("wait_for selector=#results");
        assert_eq!(wait.tool, Tool::WaitFor);
        assert_eq!(wait.selector(), Some("#results"));
    }

    #[test]
    fn first_match_is_used() {
        let action = plan("click selector=#first then click selector=#second");
        assert_eq!(action.selector(), Some("#first"));
    }

    #[test]
    fn unmatched_goal_waits_without_target() {
        for goal in ["book a flight to Lisbon", "", "type text=foo", "click #a"] {
            let action = plan(goal);
            assert_eq!(action.tool, Tool::WaitFor, "goal: {goal:?}");
            assert!(action.target.is_none());
            assert_eq!(action.rationale.as_deref(), Some("No matching pattern; waiting"));
        }
    }

    #[tokio::test]
    async fn plans_from_observation_goal() {
        let planner = PatternPlanner::new();
        let action = planner
            .plan(&Observation::goal_only("click selector=#ok"))
            .await;
        assert_eq!(action.tool, Tool::Click);
    }
}
