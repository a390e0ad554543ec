//! Plan response normalizer
//!
//! Turns the model's unreliable free-text reply into a structured
//! [`PlanResult`]. Total function: it never fails. Parse failures are
//! encoded in the result as fallback content, never surfaced as errors.

use crate::models::PlanResult;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

/// Canonical short-form summary fields
pub const SUMMARY_KEYS: [&str; 5] = [
    "optimal_planting_date",
    "expected_harvest_date",
    "expected_market_price_inr",
    "irrigation_method",
    "watering_frequency",
];

/// Canonical long-form sections, in display order
pub const SECTION_KEYS: [&str; 5] = [
    "market_timed",
    "weather_soil",
    "demand_outlook",
    "timeline",
    "actions",
];

/// Fallback section keys, appended after the canonical ones when
/// assembling the combined markdown
const FALLBACK_KEYS: [&str; 2] = ["complete", "error"];

/// Substituted when the model returns an empty reply
pub const EMPTY_REPLY_PLACEHOLDER: &str = "No insights available right now.";

/// Capture pattern for the literal form `"<key>": "<value>"`.
///
/// Case-insensitive because model output casing is not guaranteed; the value
/// class tolerates escaped quotes and escaped newlines. Section values can
/// span paragraphs, so their patterns additionally match across lines.
fn field_pattern(key: &str, multiline: bool) -> Regex {
    let flags = if multiline { "(?is)" } else { "(?i)" };
    let pattern = format!(r#"{}"{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, flags, key);
    Regex::new(&pattern).expect("field pattern is valid")
}

lazy_static! {
    /// field name → capture pattern, applied uniformly for summary fields
    static ref SUMMARY_PATTERNS: Vec<(&'static str, Regex)> = SUMMARY_KEYS
        .iter()
        .map(|key| (*key, field_pattern(key, false)))
        .collect();

    /// field name → capture pattern for the multi-line section fields
    static ref SECTION_PATTERNS: Vec<(&'static str, Regex)> = SECTION_KEYS
        .iter()
        .map(|key| (*key, field_pattern(key, true)))
        .collect();
}

/// Undo the JSON string escapes the model is instructed to emit
fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\n", "\n")
}

/// Run a pattern table over `text`, filling `out` for every matched key.
/// Keys that already hold a non-empty value are left untouched, so repeated
/// application is idempotent.
fn extract_fields(text: &str, patterns: &[(&'static str, Regex)], out: &mut HashMap<String, String>) {
    for (key, pattern) in patterns {
        if out.get(*key).is_some_and(|v| !v.is_empty()) {
            continue;
        }
        if let Some(caps) = pattern.captures(text) {
            out.insert((*key).to_string(), unescape(&caps[1]));
        }
    }
}

/// Strip a fenced code block when present, preferring a ```json fence over a
/// generic one. Returns the original text when no complete fence is found.
fn unwrap_fence(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            if end > 0 {
                return after[..end].trim();
            }
        }
    } else if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        if let Some(end) = after.find("```") {
            if end > 0 {
                return after[..end].trim();
            }
        }
    }
    text
}

/// Slice from the first `{` to the last `}`, discarding any prose the model
/// added before or after the JSON object
fn isolate_object(text: &str) -> &str {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            return &text[start..=end];
        }
    }
    text
}

/// Pull `summary`/`sections` out of a parsed value as a string→string map.
/// A missing key or wrong shape yields an empty map rather than rejecting
/// the whole parse; non-string values are skipped.
fn string_map(value: Option<&serde_json::Value>) -> HashMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Join the non-empty section values in canonical order, separated by one
/// blank line; fall back to the raw text when nothing is present
fn assemble_markdown(sections: &HashMap<String, String>, raw: &str) -> String {
    let joined = SECTION_KEYS
        .iter()
        .chain(FALLBACK_KEYS.iter())
        .filter_map(|key| sections.get(*key))
        .filter(|value| !value.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");

    if joined.is_empty() {
        raw.to_string()
    } else {
        joined
    }
}

/// Normalize a raw model reply into a fully-populated [`PlanResult`].
///
/// Steps, each attempted only when the previous one did not yield usable
/// structured data:
/// 1. Empty replies short-circuit to a fixed placeholder.
/// 2. Unwrap a fenced code block, then isolate the `{…}` span.
/// 3. Strict JSON parse, coercing missing/misshapen `summary`/`sections`
///    to empty maps.
/// 4. On parse failure, keep the whole reply under a `complete` section and
///    recover the known fields by pattern matching.
/// 5. Safety net: a successful parse with an empty summary still gets the
///    summary patterns run against the raw text.
pub fn normalize(raw_reply: &str) -> PlanResult {
    let text = raw_reply.trim();
    if text.is_empty() {
        return PlanResult {
            summary: HashMap::new(),
            sections: HashMap::new(),
            markdown: EMPTY_REPLY_PLACEHOLDER.to_string(),
            raw_text: EMPTY_REPLY_PLACEHOLDER.to_string(),
        };
    }

    let candidate = isolate_object(unwrap_fence(text));

    let mut summary;
    let mut sections;
    match serde_json::from_str::<serde_json::Value>(candidate) {
        Ok(value) => {
            summary = string_map(value.get("summary"));
            sections = string_map(value.get("sections"));
            // A reply can parse cleanly yet carry no usable summary (empty
            // object, or fields the model left outside the parsed span)
            if !summary.values().any(|v| !v.is_empty()) {
                extract_fields(text, &SUMMARY_PATTERNS, &mut summary);
            }
        }
        Err(_) => {
            summary = HashMap::new();
            sections = HashMap::new();
            // Preserve everything, then let structured matches take over
            // their own keys
            sections.insert("complete".to_string(), text.to_string());
            extract_fields(text, &SUMMARY_PATTERNS, &mut summary);
            extract_fields(text, &SECTION_PATTERNS, &mut sections);
        }
    }

    let markdown = assemble_markdown(&sections, text);

    PlanResult {
        summary,
        sections,
        markdown,
        raw_text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{"summary": {"optimal_planting_date": "May 1"}, "sections": {"actions": "- do X"}}"#;

    #[test]
    fn test_well_formed_input() {
        let result = normalize(WELL_FORMED);
        assert_eq!(result.summary.len(), 1);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections["actions"], "- do X");
        assert_eq!(result.markdown, "- do X");
        assert_eq!(result.raw_text, WELL_FORMED);
    }

    #[test]
    fn test_fenced_input_matches_bare_input() {
        let bare = normalize(WELL_FORMED);
        let fenced = normalize(&format!("```json\n{}\n```", WELL_FORMED));
        assert_eq!(bare.summary, fenced.summary);
        assert_eq!(bare.sections, fenced.sections);
        assert_eq!(bare.markdown, fenced.markdown);

        let generic = normalize(&format!("```\n{}\n```", WELL_FORMED));
        assert_eq!(bare.summary, generic.summary);
        assert_eq!(bare.sections, generic.sections);
    }

    #[test]
    fn test_surrounding_prose_is_discarded() {
        let wrapped = format!("Sure, here is your plan:\n{}\nHope that helps!", WELL_FORMED);
        let result = normalize(&wrapped);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
        assert_eq!(result.sections["actions"], "- do X");
    }

    #[test]
    fn test_fallback_recovery_on_malformed_json() {
        // Missing comma between summary and sections: strict parse fails
        let text = r#"Here you go: {"summary": {"optimal_planting_date": "May 1", "expected_harvest_date": "Aug 1"} "sections": {}}"#;
        let result = normalize(text);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
        assert_eq!(result.summary["expected_harvest_date"], "Aug 1");
        assert_eq!(result.sections["complete"], text);
        assert_eq!(result.raw_text, text);
    }

    #[test]
    fn test_fallback_section_overrides_complete_key_only() {
        let text = r###"broken json "market_timed": "## Window\nSow in May" and "timeline": "Day 1\nDay 2" trailing"###;
        let result = normalize(text);
        assert_eq!(result.sections["market_timed"], "## Window\nSow in May");
        assert_eq!(result.sections["timeline"], "Day 1\nDay 2");
        // The unstructured remainder survives under its own key
        assert_eq!(result.sections["complete"], text);
    }

    #[test]
    fn test_escaped_newlines_become_literal() {
        let text = r#"not json "timeline": "Day 1\nDay 2""#;
        let result = normalize(text);
        assert_eq!(result.sections["timeline"], "Day 1\nDay 2");
        assert!(result.sections["timeline"].contains('\n'));
        assert!(!result.sections["timeline"].contains("\\n"));
    }

    #[test]
    fn test_escaped_quotes_are_unescaped() {
        let text = r#"not json "irrigation_method": "Use \"drip\" lines""#;
        let result = normalize(text);
        assert_eq!(result.summary["irrigation_method"], "Use \"drip\" lines");
    }

    #[test]
    fn test_key_matching_is_case_insensitive() {
        let text = r#"not json "OPTIMAL_PLANTING_DATE": "May 1""#;
        let result = normalize(text);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
    }

    #[test]
    fn test_empty_input_contract() {
        let result = normalize("");
        assert!(result.summary.is_empty());
        assert!(result.sections.is_empty());
        assert_eq!(result.markdown, EMPTY_REPLY_PLACEHOLDER);
        assert_eq!(result.raw_text, EMPTY_REPLY_PLACEHOLDER);

        let whitespace = normalize("   \n  ");
        assert_eq!(whitespace.raw_text, EMPTY_REPLY_PLACEHOLDER);
    }

    #[test]
    fn test_markdown_join_order_and_empty_skipping() {
        let text = r#"{"summary": {}, "sections": {"actions": "A", "market_timed": "M", "timeline": "", "weather_soil": "W"}}"#;
        let result = normalize(text);
        // Canonical order, one blank line apart, empty values skipped
        assert_eq!(result.markdown, "M\n\nW\n\nA");
    }

    #[test]
    fn test_markdown_falls_back_to_raw_text() {
        let text = "Plant early, water often.";
        let result = normalize(text);
        // Unparseable prose lands under `complete`, so the join carries it
        assert_eq!(result.markdown, text);
        assert_eq!(result.raw_text, text);
    }

    #[test]
    fn test_summary_safety_net_after_clean_parse() {
        // The JSON span parses fine but its summary is empty; the field
        // the model emitted outside the braces is still recovered.
        let text = r#"{"summary": {}, "sections": {"actions": "- x"}} "optimal_planting_date": "May 1""#;
        let result = normalize(text);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
        assert_eq!(result.sections["actions"], "- x");
    }

    #[test]
    fn test_misshapen_summary_and_sections_are_coerced() {
        let text = r#"{"summary": "not a map", "sections": 42}"#;
        let result = normalize(text);
        assert!(result.summary.is_empty());
        assert!(result.sections.is_empty());
        assert_eq!(result.markdown, text);
    }

    #[test]
    fn test_non_string_values_are_skipped() {
        let text = r#"{"summary": {"optimal_planting_date": "May 1", "expected_market_price_inr": 104000}, "sections": {}}"#;
        let result = normalize(text);
        assert_eq!(result.summary["optimal_planting_date"], "May 1");
        assert!(!result.summary.contains_key("expected_market_price_inr"));
    }

    #[test]
    fn test_service_error_result() {
        let result = PlanResult::service_error("Gemini API", "connection refused");
        assert_eq!(result.sections["error"], "Gemini API error: connection refused");
        assert_eq!(result.markdown, "Gemini API error: connection refused");
        assert_eq!(result.raw_text, "connection refused");
        assert!(result.summary.is_empty());
    }
}
