// crates/universe/src/weights.rs
//! Factor weight resolution from the analysis report.
//!
//! The report ends with a fenced block of the form
//!
//! ````text
//! ```json
//! {"Momentum": 30, "Value": 20, "Quality": 50}
//! ```
//! ````
//!
//! Anything that cannot be read as three non-negative numbers resolves to
//! [`WeightVector::default`].

use common::{Factor, WeightVector};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

static WEIGHT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\r?\n(.*?)\r?\n```").expect("static regex"));

/// Why the default weights were used
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoPayload,
    MalformedJson(String),
    NotAnObject,
    MissingField(Factor),
    NotANumber(Factor),
    Negative(Factor),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoPayload => f.write_str("no weight block found"),
            FallbackReason::MalformedJson(e) => write!(f, "weight block is not valid JSON: {}", e),
            FallbackReason::NotAnObject => f.write_str("weight block is not a JSON object"),
            FallbackReason::MissingField(factor) => write!(f, "missing \"{}\"", factor.key()),
            FallbackReason::NotANumber(factor) => write!(f, "\"{}\" is not a number", factor.key()),
            FallbackReason::Negative(factor) => write!(f, "\"{}\" is negative", factor.key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WeightSource {
    Parsed,
    Fallback(FallbackReason),
}

/// Resolved weights plus where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct WeightResolution {
    pub weights: WeightVector,
    pub source: WeightSource,
}

impl WeightResolution {
    fn fallback(reason: FallbackReason) -> Self {
        tracing::warn!("Using default factor weights: {}", reason);
        metrics::counter!("weights_fallback").increment(1);
        Self {
            weights: WeightVector::default(),
            source: WeightSource::Fallback(reason),
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self.source, WeightSource::Fallback(_))
    }
}

/// Resolve a raw weight object; never fails
pub fn resolve(raw: Option<&Value>) -> WeightResolution {
    let Some(raw) = raw else {
        return WeightResolution::fallback(FallbackReason::NoPayload);
    };
    let Some(object) = raw.as_object() else {
        return WeightResolution::fallback(FallbackReason::NotAnObject);
    };

    let mut values = [0.0; 3];
    for (slot, factor) in values.iter_mut().zip(Factor::ALL) {
        let Some(field) = object.get(factor.key()) else {
            return WeightResolution::fallback(FallbackReason::MissingField(factor));
        };
        let Some(number) = as_number(field) else {
            return WeightResolution::fallback(FallbackReason::NotANumber(factor));
        };
        if number < 0.0 {
            return WeightResolution::fallback(FallbackReason::Negative(factor));
        }
        *slot = number;
    }

    let weights = WeightVector::new(values[0], values[1], values[2]);
    if (weights.sum() - 100.0).abs() > 0.5 {
        tracing::debug!("Weights sum to {} rather than 100, using as-is", weights.sum());
    }

    WeightResolution {
        weights,
        source: WeightSource::Parsed,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Body of the first fenced JSON block in the text
pub fn extract_weight_block(text: &str) -> Option<&str> {
    WEIGHT_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Extract, parse and resolve the weight block of a report
pub fn resolve_from_text(text: &str) -> WeightResolution {
    let Some(block) = extract_weight_block(text) else {
        return WeightResolution::fallback(FallbackReason::NoPayload);
    };

    match serde_json::from_str::<Value>(block) {
        Ok(value) => resolve(Some(&value)),
        Err(e) => WeightResolution::fallback(FallbackReason::MalformedJson(e.to_string())),
    }
}

/// Report text with every fenced JSON block removed
pub fn strip_weight_block(text: &str) -> String {
    WEIGHT_BLOCK.replace_all(text, "").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_weights_unchanged() {
        let raw = json!({"Momentum": 30, "Value": 20, "Quality": 50});
        let resolved = resolve(Some(&raw));

        assert_eq!(resolved.source, WeightSource::Parsed);
        assert_eq!(resolved.weights, WeightVector::new(30.0, 20.0, 50.0));
    }

    #[test]
    fn test_no_renormalisation() {
        let raw = json!({"Momentum": 10, "Value": 10, "Quality": 10});
        let resolved = resolve(Some(&raw));
        assert!(!resolved.used_fallback());
        assert_eq!(resolved.weights.sum(), 30.0);
    }

    #[test]
    fn test_malformed_inputs_fall_back() {
        let cases = vec![
            json!(null),
            json!([30, 20, 50]),
            json!({"Momentum": 30, "Value": 20}),
            json!({"Momentum": "high", "Value": 20, "Quality": 50}),
            json!({"Momentum": null, "Value": 20, "Quality": 50}),
            json!({"Momentum": -5, "Value": 55, "Quality": 50}),
            json!({"momentum": 30, "value": 20, "quality": 50}),
        ];

        for raw in cases {
            let resolved = resolve(Some(&raw));
            assert!(resolved.used_fallback(), "expected fallback for {}", raw);
            assert_eq!(resolved.weights, WeightVector::new(33.3, 33.3, 33.4));
        }
    }

    #[test]
    fn test_absent_falls_back() {
        let resolved = resolve(None);
        assert_eq!(resolved.source, WeightSource::Fallback(FallbackReason::NoPayload));
        assert_eq!(resolved.weights, WeightVector::default());
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let raw = json!({"Momentum": "40", "Value": 35.5, "Quality": "24.5"});
        let resolved = resolve(Some(&raw));
        assert_eq!(resolved.weights, WeightVector::new(40.0, 35.5, 24.5));
    }

    #[test]
    fn test_resolve_from_report() {
        let report = "[Rate outlook] Cut probability 60%.\n\n\
            [Factor analysis] Value leads.\n\n\
            ```json\n{\n  \"Momentum\": 25,\n  \"Value\": 45,\n  \"Quality\": 30\n}\n```\n";

        let resolved = resolve_from_text(report);
        assert_eq!(resolved.source, WeightSource::Parsed);
        assert_eq!(resolved.weights, WeightVector::new(25.0, 45.0, 30.0));
    }

    #[test]
    fn test_first_block_wins() {
        let report = "```json\n{\"Momentum\": 50, \"Value\": 30, \"Quality\": 20}\n```\n\
            more text\n\
            ```json\n{\"Momentum\": 10, \"Value\": 10, \"Quality\": 80}\n```";

        let resolved = resolve_from_text(report);
        assert_eq!(resolved.weights, WeightVector::new(50.0, 30.0, 20.0));
    }

    #[test]
    fn test_report_without_block() {
        let resolved = resolve_from_text("Weights: Momentum 30, Value 20, Quality 50");
        assert_eq!(resolved.source, WeightSource::Fallback(FallbackReason::NoPayload));
    }

    #[test]
    fn test_broken_json_block() {
        let resolved = resolve_from_text("```json\n{\"Momentum\": 30, \"Value\": \n```");
        assert!(matches!(
            resolved.source,
            WeightSource::Fallback(FallbackReason::MalformedJson(_))
        ));
        assert_eq!(resolved.weights, WeightVector::default());
    }

    #[test]
    fn test_strip_weight_block() {
        let report = "Summary line.\n```json\n{\"Momentum\": 30, \"Value\": 20, \"Quality\": 50}\n```\n";
        assert_eq!(strip_weight_block(report), "Summary line.");
        assert_eq!(strip_weight_block("no block"), "no block");
    }
}
