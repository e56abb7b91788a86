// Overlay eligibility predicate and the rule syntax used by `panel_focus.match`.
use std::str::FromStr;

use crate::view::ViewInfo;

/// Decides whether an overlay view takes part in cycling.
pub trait OverlayMatcher {
    fn matches(&self, view: &ViewInfo) -> bool;
}

impl<F> OverlayMatcher for F
where
    F: Fn(&ViewInfo) -> bool,
{
    fn matches(&self, view: &ViewInfo) -> bool {
        self(view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    AppId,
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(raw.to_string()),
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Exact(expected) => value == expected,
            Pattern::Prefix(prefix) => value.starts_with(prefix.as_str()),
        }
    }
}

/// One `field=pattern` clause of a [`ViewMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    field: Field,
    pattern: Pattern,
}

impl Criterion {
    fn matches(&self, view: &ViewInfo) -> bool {
        let value = match self.field {
            Field::AppId => view.app_id.as_deref(),
            Field::Title => view.title.as_deref(),
        };
        value.is_some_and(|value| self.pattern.matches(value))
    }
}

/// Rule-based matcher: `all`, `none`, or `field=pattern` criteria separated by
/// commas, any of which may match. A pattern ending in `*` matches by prefix.
///
/// ```
/// use panel_focus::matcher::{OverlayMatcher, ViewMatcher};
/// use panel_focus::view::{ViewInfo, ViewLayer, ViewRole};
///
/// let matcher: ViewMatcher = "app_id=waybar,title=dock*".parse().unwrap();
/// let bar = ViewInfo::new(1, ViewRole::Overlay, ViewLayer::Top).with_app_id("waybar");
/// assert!(matcher.matches(&bar));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMatcher {
    All,
    None,
    Any(Vec<Criterion>),
}

impl OverlayMatcher for ViewMatcher {
    fn matches(&self, view: &ViewInfo) -> bool {
        match self {
            ViewMatcher::All => true,
            ViewMatcher::None => false,
            ViewMatcher::Any(criteria) => criteria.iter().any(|c| c.matches(view)),
        }
    }
}

impl FromStr for ViewMatcher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "all" => return Ok(ViewMatcher::All),
            "none" | "" => return Ok(ViewMatcher::None),
            _ => {}
        }

        let mut criteria = Vec::new();
        for raw in trimmed.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (field, pattern) = raw
                .split_once('=')
                .ok_or_else(|| format!("missing '=' in match rule '{raw}'"))?;
            let field = match field.trim() {
                "app_id" => Field::AppId,
                "title" => Field::Title,
                other => {
                    return Err(format!(
                        "unknown match field '{other}', expected 'app_id' or 'title'"
                    ));
                }
            };
            let pattern = pattern.trim();
            if pattern.is_empty() {
                return Err(format!("empty pattern in match rule '{raw}'"));
            }
            criteria.push(Criterion {
                field,
                pattern: Pattern::parse(pattern),
            });
        }

        if criteria.is_empty() {
            return Ok(ViewMatcher::None);
        }
        Ok(ViewMatcher::Any(criteria))
    }
}
