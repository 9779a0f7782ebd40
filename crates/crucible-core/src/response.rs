//! Four-part structured responses.
//!
//! Backends are asked to answer with ASSESSMENT, DECISION, REASONING and
//! CONSEQUENCES sections. Models decorate headers freely (`## Decision`,
//! `**REASONING:**`), so parsing is tolerant: a header is any line that
//! starts with one of the four names, optionally wrapped in markdown.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    static ref SECTION_HEADER: Regex = Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?[ \t]*(ASSESSMENT|DECISION|REASONING|CONSEQUENCES)[ \t]*(?:\*\*)?[ \t]*(?::[ \t]*(?:\*\*)?|$)"
    ).unwrap();
}

/// One of the four required response sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSection {
    Assessment,
    Decision,
    Reasoning,
    Consequences,
}

impl ResponseSection {
    pub const ALL: [ResponseSection; 4] = [
        ResponseSection::Assessment,
        ResponseSection::Decision,
        ResponseSection::Reasoning,
        ResponseSection::Consequences,
    ];

    /// Header name as it appears in prompts.
    pub fn header(&self) -> &'static str {
        match self {
            ResponseSection::Assessment => "ASSESSMENT",
            ResponseSection::Decision => "DECISION",
            ResponseSection::Reasoning => "REASONING",
            ResponseSection::Consequences => "CONSEQUENCES",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        let upper = header.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|s| s.header() == upper)
    }
}

/// A response split into its sections.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredResponse {
    raw: String,
    sections: BTreeMap<ResponseSection, String>,
}

impl StructuredResponse {
    /// Split raw response text into sections.
    ///
    /// Text before the first header is ignored when at least one header is
    /// present. A repeated header appends to the earlier section.
    pub fn parse(text: &str) -> Self {
        let headers: Vec<(ResponseSection, usize, usize)> = SECTION_HEADER
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let section = ResponseSection::from_header(caps.get(1)?.as_str())?;
                Some((section, whole.start(), whole.end()))
            })
            .collect();

        let mut sections: BTreeMap<ResponseSection, String> = BTreeMap::new();
        for (i, (section, _, body_start)) in headers.iter().enumerate() {
            let body_end = headers
                .get(i + 1)
                .map(|(_, next_start, _)| *next_start)
                .unwrap_or(text.len());
            let body = text[*body_start..body_end].trim();
            if body.is_empty() {
                continue;
            }
            let entry = sections.entry(*section).or_default();
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(body);
        }

        Self {
            raw: text.to_string(),
            sections,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn section(&self, section: ResponseSection) -> Option<&str> {
        self.sections.get(&section).map(|s| s.as_str())
    }

    /// Whether all four sections are present.
    pub fn is_complete(&self) -> bool {
        ResponseSection::ALL
            .iter()
            .all(|s| self.sections.contains_key(s))
    }

    /// Sections joined by a single space, or the trimmed raw text when the
    /// response has no recognizable headers.
    pub fn full_text(&self) -> String {
        if self.sections.is_empty() {
            return self.raw.trim().to_string();
        }
        self.sections
            .values()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Text of `section`, falling back to the full text when it is missing.
    pub fn text_for(&self, section: Option<ResponseSection>) -> String {
        section
            .and_then(|s| self.section(s))
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.full_text())
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "ASSESSMENT: Multiple buildings collapsed.\n\
DECISION: Deploy search teams to the school first.\n\
REASONING: Children are trapped because the structure failed.\n\
CONSEQUENCES: Hospital fire response is delayed.";

    #[test]
    fn test_parse_plain_headers() {
        let response = StructuredResponse::parse(RESPONSE);
        assert!(response.is_complete());
        assert_eq!(
            response.section(ResponseSection::Decision),
            Some("Deploy search teams to the school first.")
        );
    }

    #[test]
    fn test_parse_markdown_headers() {
        let text = "## Assessment\nSevere damage.\n\n**REASONING:** Given that roads are blocked, air lift.\n";
        let response = StructuredResponse::parse(text);
        assert_eq!(response.section(ResponseSection::Assessment), Some("Severe damage."));
        assert_eq!(
            response.section(ResponseSection::Reasoning),
            Some("Given that roads are blocked, air lift.")
        );
        assert!(!response.is_complete());
    }

    #[test]
    fn test_full_text_without_headers_is_raw() {
        let response = StructuredResponse::parse("  Evacuate the valley now.  ");
        assert_eq!(response.full_text(), "Evacuate the valley now.");
        assert_eq!(
            response.text_for(Some(ResponseSection::Reasoning)),
            "Evacuate the valley now."
        );
    }

    #[test]
    fn test_full_text_joins_sections_in_order() {
        let response = StructuredResponse::parse(RESPONSE);
        let full = response.full_text();
        assert!(full.starts_with("Multiple buildings collapsed."));
        assert!(full.ends_with("Hospital fire response is delayed."));
    }

    #[test]
    fn test_header_word_inside_sentence_is_not_a_header() {
        let response = StructuredResponse::parse("My decision: wait for aid.");
        assert!(response.section(ResponseSection::Decision).is_none());

        let response = StructuredResponse::parse("Reasoning about the dam is hard.");
        assert!(response.section(ResponseSection::Reasoning).is_none());
    }
}
