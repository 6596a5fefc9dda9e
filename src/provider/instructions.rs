//! Static `instructions` text, chosen per model family.

use std::sync::Arc;

const BASE: &str = include_str!("prompts/base.md");
const REASONING_SUPPLEMENT: &str = include_str!("prompts/reasoning_supplement.md");
const CODEX: &str = include_str!("prompts/codex.md");

/// Case-insensitive predicate over a model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMatch {
    Prefix(String),
    Contains(String),
    Exact(String),
}

impl ModelMatch {
    pub fn matches(&self, model_id: &str) -> bool {
        let model = model_id.to_ascii_lowercase();
        match self {
            ModelMatch::Prefix(p) => model.starts_with(&p.to_ascii_lowercase()),
            ModelMatch::Contains(s) => model.contains(&s.to_ascii_lowercase()),
            ModelMatch::Exact(s) => model == s.to_ascii_lowercase(),
        }
    }
}

/// Ordered `(predicate, text)` rules; the first match wins, otherwise the
/// default text is used.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    rules: Vec<(ModelMatch, Arc<str>)>,
    default: Arc<str>,
}

impl InstructionTable {
    pub fn new(default: impl Into<Arc<str>>) -> Self {
        Self {
            rules: Vec::new(),
            default: default.into(),
        }
    }

    pub fn with_rule(mut self, matcher: ModelMatch, text: impl Into<Arc<str>>) -> Self {
        self.rules.push((matcher, text.into()));
        self
    }

    pub fn lookup(&self, model_id: &str) -> Arc<str> {
        self.rules
            .iter()
            .find(|(m, _)| m.matches(model_id))
            .map(|(_, text)| Arc::clone(text))
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}

impl Default for InstructionTable {
    fn default() -> Self {
        let reasoning: Arc<str> = format!("{BASE}\n{REASONING_SUPPLEMENT}").into();
        let codex: Arc<str> = CODEX.into();

        let mut table = InstructionTable::new(BASE)
            .with_rule(ModelMatch::Prefix("codex".to_string()), Arc::clone(&codex))
            .with_rule(ModelMatch::Contains("-codex".to_string()), codex);
        for prefix in ["gpt-5", "o1", "o3", "o4"] {
            table = table.with_rule(ModelMatch::Prefix(prefix.to_string()), Arc::clone(&reasoning));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codex_models_get_codex_text() {
        let table = InstructionTable::default();
        assert_eq!(&*table.lookup("codex-mini-latest"), CODEX);
        assert_eq!(&*table.lookup("gpt-5-codex"), CODEX);
        assert_eq!(&*table.lookup("GPT-5.1-Codex-Max"), CODEX);
    }

    #[test]
    fn reasoning_models_get_base_plus_supplement() {
        let table = InstructionTable::default();
        let text = table.lookup("gpt-5");
        assert!(text.starts_with(BASE));
        assert!(text.ends_with(REASONING_SUPPLEMENT));
    }

    #[test]
    fn other_models_get_base() {
        let table = InstructionTable::default();
        assert_eq!(&*table.lookup("gpt-4.1"), BASE);
    }

    #[test]
    fn custom_rules_are_evaluated_in_order() {
        let table = InstructionTable::new("default")
            .with_rule(ModelMatch::Exact("m1".to_string()), "first")
            .with_rule(ModelMatch::Prefix("m".to_string()), "second");
        assert_eq!(&*table.lookup("M1"), "first");
        assert_eq!(&*table.lookup("m2"), "second");
        assert_eq!(&*table.lookup("x"), "default");
    }
}
