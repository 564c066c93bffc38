//! The action protocol shared by every planner and executor.
//!
//! An [`Action`] is one unit of intent: a [`Tool`], an optional [`Target`]
//! saying where it applies, and tool-specific payload. The shapes are
//! deliberately permissive. Nothing here checks that a `type` carries text or
//! that a `click` carries a target; executors treat missing pieces as no-ops.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::error::SchemaError;

/// Every operation a planner may request.
///
/// The first four are implemented by the web executor. The rest are reserved
/// for desktop and mobile executors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tool {
    Click,
    Type,
    Scroll,
    WaitFor,
    Tap,
    Swipe,
    Hotkey,
    AppLaunch,
    FocusWindow,
    AdbShell,
    Back,
    Home,
}

impl Tool {
    pub fn is_web(self) -> bool {
        matches!(self, Tool::Click | Tool::Type | Tool::Scroll | Tool::WaitFor)
    }
}

/// Structured locator hints. Each platform reads the fields it understands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetBy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// CSS or XPath, web only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// macOS accessibility path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ax_path: Option<String>,
    /// Windows UI Automation selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uia_selector: Option<String>,
    /// Linux AT-SPI path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atspi_path: Option<String>,
}

impl TargetBy {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }
}

/// Where an action applies: a structured locator first, a bounding box second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<TargetBy>,
    /// `[x1, y1, x2, y2]` in screenshot pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl Target {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            by: Some(TargetBy::selector(selector)),
            bbox: None,
        }
    }

    pub fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            by: None,
            bbox: Some([x1, y1, x2, y2]),
        }
    }

    /// The web locator, if one is set and non-empty.
    pub fn css_or_xpath(&self) -> Option<&str> {
        self.by
            .as_ref()
            .and_then(|by| by.selector.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Center of the bounding box, rounded to the nearest pixel.
    pub fn centroid(&self) -> Option<(i64, i64)> {
        let [x1, y1, x2, y2] = self.bbox?;
        let cx = (x1 + x2) / 2.0;
        let cy = (y1 + y2) / 2.0;
        if !cx.is_finite() || !cy.is_finite() {
            return None;
        }
        Some((cx.round() as i64, cy.round() as i64))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sel) = self.css_or_xpath() {
            return write!(f, "selector `{sel}`");
        }
        if let Some([x1, y1, x2, y2]) = self.bbox {
            return write!(f, "bbox [{x1}, {y1}, {x2}, {y2}]");
        }
        if let Some(by) = &self.by {
            let hint = by
                .text
                .as_deref()
                .or(by.title.as_deref())
                .or(by.role.as_deref())
                .or(by.ax_path.as_deref())
                .or(by.uia_selector.as_deref())
                .or(by.atspi_path.as_deref());
            if let Some(hint) = hint {
                return write!(f, "hint `{hint}`");
            }
        }
        f.write_str("<no target>")
    }
}

/// A tool-specific argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ArgValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        ArgValue::Number(n)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Number(n as f64)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

/// One planner-issued unit of intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub tool: Tool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(
        rename = "inputText",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, ArgValue>>,
    /// Post-condition marker. Serialized as `assert`.
    #[serde(rename = "assert", default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
    /// Free-form justification, only ever logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Action {
    /// Build an action from a tool name, rejecting names outside [`Tool`].
    pub fn new(tool: &str) -> Result<Self, SchemaError> {
        let tool = tool
            .parse::<Tool>()
            .map_err(|_| SchemaError::UnknownTool(tool.to_string()))?;
        Ok(Self::with_tool(tool))
    }

    pub fn with_tool(tool: Tool) -> Self {
        Self {
            tool,
            target: None,
            input_text: None,
            args: None,
            assertion: None,
            rationale: None,
        }
    }

    /// The fallback every planner returns when it has nothing better.
    pub fn default_wait(reason: impl Into<String>) -> Self {
        Self::with_tool(Tool::WaitFor).with_rationale(reason)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_input_text(mut self, text: impl Into<String>) -> Self {
        self.input_text = Some(text.into());
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_assertion(mut self, assertion: impl Into<String>) -> Self {
        self.assertion = Some(assertion.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn selector(&self) -> Option<&str> {
        self.target.as_ref().and_then(Target::css_or_xpath)
    }

    pub fn arg(&self, key: &str) -> Option<&ArgValue> {
        self.args.as_ref().and_then(|args| args.get(key))
    }

    /// Parse an action from its external JSON shape.
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        if let Some(tool) = value.get("tool").and_then(Value::as_str) {
            if tool.parse::<Tool>().is_err() {
                return Err(SchemaError::UnknownTool(tool.to_string()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Short human description used in logs and error context.
    pub fn target_label(&self) -> String {
        match &self.target {
            Some(target) => target.to_string(),
            None => "<no target>".to_string(),
        }
    }
}

/// Serialize an action to its external field mapping.
///
/// Fields keep declaration order, unset optionals are dropped, and the
/// assertion is emitted as `assert`.
pub fn action_to_map(action: &Action) -> Map<String, Value> {
    match serde_json::to_value(action) {
        Ok(Value::Object(map)) => map,
        // Action always serializes to an object.
        _ => Map::new(),
    }
}

/// One step's view of the interface, handed to a planner and then dropped.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    /// Serialized document (HTML for web).
    pub snapshot: Option<String>,
    /// PNG screenshot bytes.
    pub screenshot: Option<Vec<u8>>,
    pub goal: String,
}

impl Observation {
    pub fn goal_only(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Default::default()
        }
    }
}
