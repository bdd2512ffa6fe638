//! File records: listing entries and the editable file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of the file browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl FileEntry {
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            path,
            name,
            collection: None,
            size: None,
        }
    }
}

/// A loaded, editable file: structured fields plus body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorFile {
    pub path: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl EditorFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: Map::new(),
            body: String::new(),
            preview_url: None,
        }
    }

    /// Array field `name`, empty if missing or not an array.
    pub fn list(&self, name: &str) -> Vec<Value> {
        match self.data.get(name) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn set_list(&mut self, name: impl Into<String>, items: Vec<Value>) {
        self.data.insert(name.into(), Value::Array(items));
    }
}
