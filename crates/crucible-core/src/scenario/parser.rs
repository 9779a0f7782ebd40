//! Scenario parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_scenario_schema;
use crate::types::SimulationEvent;

/// Errors that can occur when loading scenarios.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Scenario does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Scenario validation failed: {0}")]
    ValidationError(String),
}

/// A named crisis scenario: an ordered, fixed event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Human-readable name (e.g., "Earthquake Response")
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Events in the order they are replayed
    pub events: Vec<SimulationEvent>,
}

impl Scenario {
    /// Parse a scenario from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load a scenario, choosing the format by extension (`.json` is JSON,
    /// anything else is YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_yaml_file(path),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, ScenarioError> {
        validate_scenario_schema(&value).map_err(ScenarioError::SchemaError)?;
        let scenario: Scenario = serde_json::from_value(value)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check invariants the schema cannot express.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::ValidationError(
                "Scenario name cannot be empty".to_string(),
            ));
        }
        if self.events.is_empty() {
            return Err(ScenarioError::ValidationError(format!(
                "Scenario '{}' has no events",
                self.name
            )));
        }
        for (idx, event) in self.events.iter().enumerate() {
            if !(1..=5).contains(&event.severity_level) {
                return Err(ScenarioError::ValidationError(format!(
                    "Event {} ('{}') has severity {} outside 1-5",
                    idx + 1,
                    event.event_type,
                    event.severity_level
                )));
            }
        }
        Ok(())
    }

    /// Identifier derived from the name: lowercased, spaces replaced by
    /// underscores.
    pub fn id(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }

    /// Number of events that require a decision response.
    pub fn actionable_events(&self) -> usize {
        self.events.iter().filter(|e| e.required_action).count()
    }
}
