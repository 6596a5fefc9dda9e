//! Mapping caller tools onto the backend's fixed two-tool vocabulary.

use super::types::Warning;
use crate::prompt::{ToolChoice, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

pub const SHELL_TOOL: &str = "shell";
pub const UPDATE_PLAN_TOOL: &str = "update_plan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    Shell,
    UpdatePlan,
}

impl ToolFamily {
    pub fn canonical_name(self) -> &'static str {
        match self {
            ToolFamily::Shell => SHELL_TOOL,
            ToolFamily::UpdatePlan => UPDATE_PLAN_TOOL,
        }
    }

    fn spec(self) -> ToolSpec {
        match self {
            ToolFamily::Shell => ToolSpec {
                kind: "function",
                name: SHELL_TOOL,
                description: "Runs a shell command and returns its output.",
                strict: false,
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "The command to execute"
                        },
                        "workdir": {
                            "type": "string",
                            "description": "The working directory to execute the command in"
                        },
                        "timeout_ms": {
                            "type": "number",
                            "description": "The timeout for the command in milliseconds"
                        }
                    },
                    "required": ["command"],
                    "additionalProperties": false
                }),
            },
            ToolFamily::UpdatePlan => ToolSpec {
                kind: "function",
                name: UPDATE_PLAN_TOOL,
                description: "Updates the task plan. Provide an optional explanation and a list of plan \
                              items, each with a step and status. At most one step can be in_progress \
                              at a time.",
                strict: false,
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "explanation": { "type": "string" },
                        "plan": {
                            "type": "array",
                            "description": "The list of steps",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "step": { "type": "string" },
                                    "status": {
                                        "type": "string",
                                        "description": "One of: pending, in_progress, completed"
                                    }
                                },
                                "required": ["step", "status"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["plan"],
                    "additionalProperties": false
                }),
            },
        }
    }

    fn from_canonical(name: &str) -> Option<Self> {
        match name {
            SHELL_TOOL => Some(ToolFamily::Shell),
            UPDATE_PLAN_TOOL => Some(ToolFamily::UpdatePlan),
            _ => None,
        }
    }
}

/// Keyword rule for one family: exact names first, then substrings.
/// Matching is case-insensitive.
struct FamilyRule {
    family: ToolFamily,
    exact: &'static [&'static str],
    contains: &'static [&'static str],
}

/// Evaluated in order; the first matching rule wins.
const FAMILY_RULES: &[FamilyRule] = &[
    FamilyRule {
        family: ToolFamily::Shell,
        exact: &["bash", "shell", "command"],
        contains: &["execute", "command"],
    },
    FamilyRule {
        family: ToolFamily::UpdatePlan,
        exact: &["todowrite", "update_plan", "plan", "todo"],
        contains: &["plan", "todo"],
    },
];

pub fn classify_tool(name: &str) -> Option<ToolFamily> {
    let lower = name.to_ascii_lowercase();
    FAMILY_RULES
        .iter()
        .find(|rule| {
            rule.exact.contains(&lower.as_str()) || rule.contains.iter().any(|k| lower.contains(k))
        })
        .map(|rule| rule.family)
}

/// Backend function tool definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub strict: bool,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireToolChoice {
    None,
    Auto,
    Required,
}

/// Per-request table between canonical backend names and caller names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolIdentityMap {
    to_caller: HashMap<&'static str, String>,
}

impl ToolIdentityMap {
    /// Register `caller` for `family` unless the family already has a name.
    fn register(&mut self, family: ToolFamily, caller: &str) -> bool {
        if self.to_caller.contains_key(family.canonical_name()) {
            return false;
        }
        self.to_caller
            .insert(family.canonical_name(), caller.to_string());
        true
    }

    /// Caller-facing name for a backend tool name; unmapped names pass through.
    pub fn caller_name<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.to_caller
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Backend name for a caller tool name; unmapped names pass through.
    pub fn canonical_name<'a>(&self, caller: &'a str) -> &'a str {
        self.to_caller
            .iter()
            .find(|(_, name)| name.as_str() == caller)
            .map(|(canonical, _)| *canonical)
            .unwrap_or(caller)
    }

    pub fn is_empty(&self) -> bool {
        self.to_caller.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_caller.len()
    }
}

#[derive(Debug, Default)]
pub struct PreparedTools {
    pub tools: Vec<ToolSpec>,
    pub tool_choice: Option<WireToolChoice>,
    pub warnings: Vec<Warning>,
    pub identity: ToolIdentityMap,
}

pub fn prepare_tools(tools: &[ToolDefinition], tool_choice: Option<&ToolChoice>) -> PreparedTools {
    let mut out = PreparedTools::default();

    for tool in tools {
        let name = match tool {
            ToolDefinition::Function { name, .. } => name,
            ToolDefinition::ProviderDefined { id, name } => {
                out.warnings.push(Warning::other(format!(
                    "unsupported tool type: provider-defined tool {name} ({id}) is not sent"
                )));
                continue;
            }
        };

        let Some(family) = classify_tool(name) else {
            out.warnings.push(Warning::UnsupportedTool {
                tool_name: name.clone(),
                details: Some(format!(
                    "only {SHELL_TOOL}- and {UPDATE_PLAN_TOOL}-like tools can be offered to this backend"
                )),
            });
            continue;
        };

        if out.identity.register(family, name) {
            out.tools.push(family.spec());
        } else {
            tracing::debug!(
                tool = %name,
                canonical = family.canonical_name(),
                mapped_to = out.identity.caller_name(family.canonical_name()),
                "backend tool already mapped; ignoring duplicate"
            );
        }
    }

    out.tool_choice = match tool_choice {
        None if !out.tools.is_empty() => Some(WireToolChoice::Auto),
        None => None,
        Some(ToolChoice::Auto) => Some(WireToolChoice::Auto),
        Some(ToolChoice::None) => Some(WireToolChoice::None),
        Some(ToolChoice::Required) => Some(WireToolChoice::Required),
        Some(ToolChoice::Tool { name }) => {
            out.warnings.push(Warning::setting(
                "toolChoice",
                format!("forcing tool {name} is not supported; using auto"),
            ));
            Some(WireToolChoice::Auto)
        }
    };

    out
}

#[derive(Debug, Deserialize)]
struct ShellArgs {
    command: Vec<String>,
    // Type-checked only.
    #[serde(default, rename = "workdir")]
    _workdir: Option<String>,
    #[serde(default)]
    timeout_ms: Option<f64>,
}

impl ShellArgs {
    fn check(&self) -> Result<(), String> {
        if self.command.is_empty() {
            return Err("command must not be empty".to_string());
        }
        if self.timeout_ms.is_some_and(|t| !t.is_finite() || t < 0.0) {
            return Err("timeout_ms must be a non-negative number".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UpdatePlanArgs {
    #[serde(default, rename = "explanation")]
    _explanation: Option<String>,
    plan: Vec<PlanItem>,
}

#[derive(Debug, Deserialize)]
struct PlanItem {
    step: String,
    status: PlanStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PlanStatus {
    Pending,
    InProgress,
    Completed,
}

impl UpdatePlanArgs {
    fn check(&self) -> Result<(), String> {
        if self.plan.iter().any(|item| item.step.trim().is_empty()) {
            return Err("plan steps must not be empty".to_string());
        }
        let in_progress = self
            .plan
            .iter()
            .filter(|item| item.status == PlanStatus::InProgress)
            .count();
        if in_progress > 1 {
            return Err(format!("at most one step can be in_progress, got {in_progress}"));
        }
        Ok(())
    }
}

/// Check tool arguments against the schema of the backend tool `canonical`.
///
/// Unknown tools only need to carry a JSON object.
pub fn validate_arguments(canonical: &str, arguments: &str) -> Result<(), String> {
    match ToolFamily::from_canonical(canonical) {
        Some(ToolFamily::Shell) => serde_json::from_str::<ShellArgs>(arguments)
            .map_err(|e| e.to_string())?
            .check(),
        Some(ToolFamily::UpdatePlan) => serde_json::from_str::<UpdatePlanArgs>(arguments)
            .map_err(|e| e.to_string())?
            .check(),
        None => serde_json::from_str::<serde_json::Map<String, Value>>(arguments)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}
