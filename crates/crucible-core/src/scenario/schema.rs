//! JSON Schema validation for scenario files.
//!
//! The schema is embedded at compile time and compiled once.

use std::sync::OnceLock;

const SCENARIO_SCHEMA_JSON: &str = include_str!("../../schema/scenario.schema.json");

static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static jsonschema::Validator, String> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(SCENARIO_SCHEMA_JSON)
                .map_err(|e| format!("Invalid scenario schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("Failed to compile scenario schema: {}", e))
        })
        .as_ref()
        .map_err(|e| e.clone())
}

/// Validate a scenario document against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_scenario_schema(scenario: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(scenario)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_scenario_passes() {
        let value = json!({
            "name": "Flood",
            "events": [{
                "event_type": "initial_report",
                "description": "River breached the levee.",
                "severity_level": 4,
                "required_action": true
            }]
        });
        assert!(validate_scenario_schema(&value).is_ok());
    }

    #[test]
    fn test_severity_out_of_range_fails() {
        let value = json!({
            "name": "Flood",
            "events": [{
                "event_type": "initial_report",
                "description": "River breached the levee.",
                "severity_level": 9,
                "required_action": true
            }]
        });
        let errors = validate_scenario_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/events/0/severity_level")));
    }

    #[test]
    fn test_nested_context_value_fails() {
        let value = json!({
            "name": "Flood",
            "events": [{
                "event_type": "update",
                "description": "Levee status.",
                "severity_level": 2,
                "required_action": false,
                "context_update": { "levee": { "north": "breached" } }
            }]
        });
        assert!(validate_scenario_schema(&value).is_err());
    }

    #[test]
    fn test_missing_events_fails() {
        let value = json!({ "name": "Empty" });
        assert!(validate_scenario_schema(&value).is_err());
    }
}
