//! Page-side helpers: small scripts evaluated in the tab and the parsing of
//! their results. Nothing here modifies the page except [`reveal_point`],
//! which may scroll the window.

use anyhow::{Context, Result};
use headless_chrome::{Element, Tab};

/// Runs with `this` bound to the element.
const IS_VISIBLE_FN: &str = r#"
function() {
  const r = this.getBoundingClientRect();
  const s = getComputedStyle(this);
  return r.width > 0 && r.height > 0
    && s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0';
}
"#;

const PAGE_SIZE_JS: &str = r#"
(() => {
  const d = document.documentElement;
  const b = document.body || d;
  return JSON.stringify([
    Math.max(d.scrollWidth, b.scrollWidth, d.clientWidth),
    Math.max(d.scrollHeight, b.scrollHeight, d.clientHeight)
  ]);
})()
"#;

const VIEWPORT_JS: &str = "JSON.stringify([scrollX, scrollY, innerWidth, innerHeight])";

/// Scroll position and size of the layout viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewportState {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.scroll_x
            && x < self.scroll_x + self.width
            && y >= self.scroll_y
            && y < self.scroll_y + self.height
    }

    /// Page coordinates to the client coordinates input events expect.
    pub fn to_client(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.scroll_x, y - self.scroll_y)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

/// Whether a selector should be resolved as XPath rather than CSS.
pub fn xpath_of(selector: &str) -> Option<&str> {
    let trimmed = selector.trim();
    if let Some(rest) = trimmed.strip_prefix("xpath=") {
        return Some(rest);
    }
    if trimmed.starts_with('/') || trimmed.starts_with("(/") {
        return Some(trimmed);
    }
    None
}

/// Find an element once, without waiting.
pub fn find<'a>(tab: &'a Tab, selector: &str) -> Result<Element<'a>> {
    match xpath_of(selector) {
        Some(xpath) => tab.find_element_by_xpath(xpath),
        None => tab.find_element(selector),
    }
}

pub fn is_visible(element: &Element<'_>) -> bool {
    element
        .call_js_fn(IS_VISIBLE_FN, vec![], false)
        .ok()
        .and_then(|obj| obj.value)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Full scrollable size of the document in CSS pixels.
pub fn page_size(tab: &Tab) -> Result<(f64, f64)> {
    let result = tab.evaluate(PAGE_SIZE_JS, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .context("page size script returned nothing")?;
    parse_page_size(&raw)
}

pub fn viewport(tab: &Tab) -> Result<ViewportState> {
    eval_viewport(tab, VIEWPORT_JS)
}

/// Scroll the window so the page point `(x, y)` is on screen, centring it if
/// it was not, and report where the viewport ended up.
pub fn reveal_point(tab: &Tab, x: f64, y: f64) -> Result<ViewportState> {
    let script = format!(
        r#"((x, y) => {{
  const w = innerWidth, h = innerHeight;
  if (x < scrollX || x >= scrollX + w || y < scrollY || y >= scrollY + h) {{
    window.scrollTo({{ left: Math.max(0, x - w / 2), top: Math.max(0, y - h / 2), behavior: 'instant' }});
  }}
  return {VIEWPORT_JS};
}})({x}, {y})"#
    );
    eval_viewport(tab, &script)
}

fn eval_viewport(tab: &Tab, script: &str) -> Result<ViewportState> {
    let result = tab.evaluate(script, false)?;
    let raw = result
        .value
        .and_then(|v| v.as_str().map(String::from))
        .context("viewport script returned nothing")?;
    parse_viewport(&raw)
}

fn parse_viewport(raw: &str) -> Result<ViewportState> {
    let [scroll_x, scroll_y, width, height]: [f64; 4] =
        serde_json::from_str(raw).context("bad viewport state")?;
    Ok(ViewportState {
        scroll_x,
        scroll_y,
        width,
        height,
    })
}

fn parse_page_size(raw: &str) -> Result<(f64, f64)> {
    let [w, h]: [f64; 2] = serde_json::from_str(raw).context("bad page size")?;
    Ok((w.max(1.0), h.max(1.0)))
}
