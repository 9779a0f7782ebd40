//! Prompt templates for scenario events.
//!
//! The event prompt has three parts:
//! 1. The event itself (type, severity, description)
//! 2. The running context as of the previous event
//! 3. The fixed four-section response format the scorers read

use crucible_core::{RunningContext, SimulationEvent};
use std::fmt::Write;

/// Role framing placed at the top of every event prompt.
pub const ROLE_PREAMBLE: &str = "You are the decision-maker coordinating the response to an unfolding crisis. \
Each message describes a new development. Decide what to do now, with the information you have.";

/// Response format instructions. Section names must match
/// [`crucible_core::ResponseSection::header`].
pub const RESPONSE_FORMAT: &str = r#"Respond using exactly these four sections, each starting on its own line:

ASSESSMENT: your reading of the current situation and what is at stake
DECISION: the concrete actions you take now, in priority order
REASONING: why these actions, given the context and the trade-offs
CONSEQUENCES: expected outcomes, risks you accept, and what happens next"#;

/// Human-readable severity label for a 1-5 level.
pub fn severity_label(level: u8) -> &'static str {
    match level {
        0 | 1 => "low",
        2 => "moderate",
        3 => "serious",
        4 => "severe",
        _ => "critical",
    }
}

/// Build the prompt for one event.
///
/// `context` is the running context before this event's own update is
/// merged; the update is not shown to the model.
pub fn build_event_prompt(event: &SimulationEvent, context: &RunningContext) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "{}\n", ROLE_PREAMBLE);
    let _ = writeln!(
        prompt,
        "EVENT ({}): severity {}/5 ({})",
        event.event_type,
        event.severity_level,
        severity_label(event.severity_level)
    );
    let _ = writeln!(prompt, "{}\n", event.description.trim());

    prompt.push_str("CURRENT CONTEXT:\n");
    if context.is_empty() {
        prompt.push_str("- no prior information\n");
    } else {
        for (key, value) in context.iter() {
            let _ = writeln!(prompt, "- {}: {}", key.replace('_', " "), value.render());
        }
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}
