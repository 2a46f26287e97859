use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A finished pipeline stage and the workflows that ran in it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

/// A workflow run inside a stage. `external_id` is the build slug whose
/// artifacts get pulled.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub external_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(name: &str, external_id: &str) -> Self {
        Self {
            name: name.to_string(),
            external_id: external_id.to_string(),
            ..Self::default()
        }
    }
}

impl Stage {
    pub fn new(name: &str, workflows: Vec<Workflow>) -> Self {
        Self {
            name: name.to_string(),
            workflows,
            ..Self::default()
        }
    }
}

/// Parses the finished stages JSON exposed by the CI platform.
///
/// Blank input means no stage has finished yet.
pub fn parse_finished_stages(raw: &str) -> Result<Vec<Stage>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    Ok(serde_json::from_str(raw)?)
}
