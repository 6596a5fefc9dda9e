//! Per-model reasoning configuration.

use super::types::Warning;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_EFFORT: &str = "medium";
pub const DEFAULT_SUMMARY: &str = "auto";

/// Model families (case-insensitive prefixes) that accept a `reasoning` block.
const REASONING_PREFIXES: &[&str] = &["gpt-5", "codex", "o1", "o3", "o4"];

/// Summary values the backend handles inconsistently.
const UNRELIABLE_SUMMARIES: &[&str] = &["none", "concise"];

/// Tri-state reasoning knob.
///
/// In TOML a string sets a value and `false` disables; leaving the key out
/// keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReasoningSetting {
    #[default]
    Unset,
    Disabled,
    Value(String),
}

impl ReasoningSetting {
    pub fn value(v: impl Into<String>) -> Self {
        Self::Value(v.into())
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ReasoningSetting::Unset)
    }

    /// `self` unless it is unset, in which case `fallback`.
    pub fn or<'a>(&'a self, fallback: &'a ReasoningSetting) -> &'a ReasoningSetting {
        if self.is_unset() {
            fallback
        } else {
            self
        }
    }
}

impl<'de> Deserialize<'de> for ReasoningSetting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(true)) => ReasoningSetting::Unset,
            Some(Raw::Flag(false)) => ReasoningSetting::Disabled,
            Some(Raw::Text(s)) => ReasoningSetting::Value(s),
        })
    }
}

impl Serialize for ReasoningSetting {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReasoningSetting::Unset => serializer.serialize_none(),
            ReasoningSetting::Disabled => serializer.serialize_bool(false),
            ReasoningSetting::Value(v) => serializer.serialize_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reasoning {
    pub effort: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub fn supports_reasoning(model_id: &str) -> bool {
    let lower = model_id.to_ascii_lowercase();
    REASONING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Values other than the disable sentinel are forwarded as-is; the backend
/// is left to reject ones it does not know.
pub fn resolve_reasoning(
    model_id: &str,
    effort: &ReasoningSetting,
    summary: &ReasoningSetting,
) -> Option<Reasoning> {
    if !supports_reasoning(model_id) {
        return None;
    }

    let effort = match effort {
        ReasoningSetting::Disabled => return None,
        ReasoningSetting::Unset => DEFAULT_EFFORT.to_string(),
        ReasoningSetting::Value(v) => v.clone(),
    };
    let summary = match summary {
        ReasoningSetting::Disabled => None,
        ReasoningSetting::Unset => Some(DEFAULT_SUMMARY.to_string()),
        ReasoningSetting::Value(v) => Some(v.clone()),
    };

    Some(Reasoning { effort, summary })
}

pub fn reasoning_warnings(reasoning: &Reasoning) -> Vec<Warning> {
    match reasoning.summary.as_deref() {
        Some(s) if UNRELIABLE_SUMMARIES.contains(&s) => vec![Warning::setting(
            "reasoningSummary",
            format!("summary \"{s}\" may be ignored or rejected by the backend"),
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_reasoning_models() {
        let r = resolve_reasoning("gpt-5", &ReasoningSetting::Unset, &ReasoningSetting::Unset);
        assert_eq!(
            r,
            Some(Reasoning {
                effort: "medium".to_string(),
                summary: Some("auto".to_string()),
            })
        );
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        assert!(supports_reasoning("GPT-5-Codex"));
        assert!(supports_reasoning("codex-mini-latest"));
        assert!(supports_reasoning("o3"));
        assert!(!supports_reasoning("gpt-4.1"));
    }

    #[test]
    fn unsupported_model_never_gets_reasoning() {
        let effort = ReasoningSetting::value("high");
        assert_eq!(resolve_reasoning("gpt-4o", &effort, &ReasoningSetting::Unset), None);
    }

    #[test]
    fn disabled_effort_removes_reasoning() {
        let r = resolve_reasoning("gpt-5", &ReasoningSetting::Disabled, &ReasoningSetting::Unset);
        assert_eq!(r, None);
    }

    #[test]
    fn disabled_summary_keeps_effort() {
        let r = resolve_reasoning("gpt-5", &ReasoningSetting::value("low"), &ReasoningSetting::Disabled);
        assert_eq!(
            r,
            Some(Reasoning {
                effort: "low".to_string(),
                summary: None,
            })
        );
    }

    #[test]
    fn unknown_values_pass_through() {
        let r = resolve_reasoning(
            "gpt-5",
            &ReasoningSetting::value("ultra"),
            &ReasoningSetting::value("verbose"),
        )
        .unwrap();
        assert_eq!(r.effort, "ultra");
        assert_eq!(r.summary.as_deref(), Some("verbose"));
        assert!(reasoning_warnings(&r).is_empty());
    }

    #[test]
    fn concise_summary_warns() {
        let r = resolve_reasoning("gpt-5", &ReasoningSetting::Unset, &ReasoningSetting::value("concise"))
            .unwrap();
        assert_eq!(reasoning_warnings(&r).len(), 1);
    }

    #[test]
    fn setting_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct T {
            #[serde(default)]
            a: ReasoningSetting,
            #[serde(default)]
            b: ReasoningSetting,
            #[serde(default)]
            c: ReasoningSetting,
        }
        let t: T = toml::from_str("a = \"high\"\nb = false\n").unwrap();
        assert_eq!(t.a, ReasoningSetting::value("high"));
        assert_eq!(t.b, ReasoningSetting::Disabled);
        assert_eq!(t.c, ReasoningSetting::Unset);
    }

    #[test]
    fn override_falls_back_only_when_unset() {
        let default = ReasoningSetting::value("high");
        assert_eq!(ReasoningSetting::Unset.or(&default), &default);
        assert_eq!(ReasoningSetting::Disabled.or(&default), &ReasoningSetting::Disabled);
    }
}
