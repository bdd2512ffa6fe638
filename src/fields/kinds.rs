//! Built-in list kinds: blank item template and item validator per kind.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

use super::ListField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Images and other assets: `{src, alt}`
    Media,
    /// Navigation entries: `{title, url}`
    Menu,
    /// Typed content blocks: `{type, ...}`
    Partial,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Media => "media",
            ListKind::Menu => "menu",
            ListKind::Partial => "partial",
        }
    }

    /// Value a freshly inserted item starts from
    pub fn blank(&self) -> Value {
        match self {
            ListKind::Media => json!({ "src": "", "alt": "" }),
            ListKind::Menu => json!({ "title": "", "url": "" }),
            ListKind::Partial => json!({ "type": "" }),
        }
    }

    pub fn validator(&self) -> fn(&Value) -> bool {
        match self {
            ListKind::Media => |v: &Value| has_text(v, "src"),
            ListKind::Menu => |v: &Value| has_text(v, "title"),
            ListKind::Partial => |v: &Value| has_text(v, "type"),
        }
    }

    /// Guess the kind of an array field from the keys its items carry.
    pub fn detect(items: &[Value]) -> Option<ListKind> {
        let first = items.first()?.as_object()?;
        if first.contains_key("type") {
            Some(ListKind::Partial)
        } else if first.contains_key("src") {
            Some(ListKind::Media)
        } else if first.contains_key("title") {
            Some(ListKind::Menu)
        } else {
            None
        }
    }

    /// A list field of this kind holding `value`.
    pub fn field(&self, name: impl Into<String>, value: Vec<Value>) -> ListField<Value> {
        ListField::new(name, value, self.blank()).with_validator(self.validator())
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "media" => Ok(ListKind::Media),
            "menu" => Ok(ListKind::Menu),
            "partial" => Ok(ListKind::Partial),
            other => anyhow::bail!("Unknown list kind: {}", other),
        }
    }
}

fn has_text(value: &Value, key: &str) -> bool {
    value
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}
