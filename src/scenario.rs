//! Scripted host behaviour for replaying a compose session against a page.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::host::{PageDocument, PageError};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("page error: {0}")]
    Page(#[from] PageError),
    #[error("no element matches selector: {0}")]
    NoMatch(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Initial HTML of the host page.
    pub page: String,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    /// How long to keep running after the last step.
    #[serde(default)]
    pub linger_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Delay relative to the previous step.
    #[serde(default)]
    pub after_ms: u64,
    pub action: StepAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    Click { selector: String },
    Insert { parent: String, html: String },
    Remove { selector: String },
    Wait,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Total scripted time, including the trailing linger.
    pub fn duration_ms(&self) -> u64 {
        self.steps.iter().map(|step| step.after_ms).sum::<u64>() + self.linger_ms
    }
}

impl StepAction {
    /// Apply this host-side action to the page. The first match of a selector is used.
    pub fn apply(&self, document: &mut PageDocument) -> Result<(), ScenarioError> {
        match self {
            StepAction::Click { selector } => {
                let node = require(document, selector)?;
                document.click(&node);
            }
            StepAction::Insert { parent, html } => {
                let node = require(document, parent)?;
                document.insert_html(&node, html);
            }
            StepAction::Remove { selector } => {
                let node = require(document, selector)?;
                document.remove(&node);
            }
            StepAction::Wait => {}
        }
        Ok(())
    }
}

fn require(document: &PageDocument, selector: &str) -> Result<kuchiki::NodeRef, ScenarioError> {
    document
        .query(selector)?
        .ok_or_else(|| ScenarioError::NoMatch(selector.to_string()))
}
