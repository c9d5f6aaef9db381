//! Ingestion options. Every field has a default, so `{}` is a complete
//! configuration file.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FitsError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Segment display names skipped before merging.
    #[serde(default)]
    pub exclude: BTreeSet<String>,
    /// Group same-shape segments of the same kind into one dataset.
    #[serde(default)]
    pub auto_merge: bool,
    /// Label prefix overriding the one derived from the source.
    #[serde(default)]
    pub label: Option<String>,
}

impl IngestOptions {
    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_auto_merge(mut self, auto_merge: bool) -> Self {
        self.auto_merge = auto_merge;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.contains(name)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FitsError::io(path, e))?;
        Self::from_json_str(&text)
    }
}
