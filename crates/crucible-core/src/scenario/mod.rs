//! Scenario loading and validation.
//!
//! A scenario is a named, fixed, finite sequence of [`SimulationEvent`]s,
//! stored as YAML or JSON and validated against an embedded JSON Schema
//! before it is deserialized.
//!
//! [`SimulationEvent`]: crate::types::SimulationEvent

mod parser;
mod schema;

pub use parser::{Scenario, ScenarioError};
pub use schema::validate_scenario_schema;
