use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::credential::{CredentialId, ProviderKind};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::prompt::PromptId;

/// Upper bound for a delay step. Workflows are request-scoped, long
/// sleeps belong in an external scheduler.
pub const MAX_DELAY_MS: u64 = 60_000;

/// One provider/model pair a prompt step may call, with per-route retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub provider: ProviderKind,
    pub model: String,
    pub credential_id: CredentialId,
    #[serde(default)]
    pub retries: u32,
}

/// How a prompt step with several routes picks a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Try routes in order, first success wins.
    #[default]
    Fallback,
    /// Fan out to every route concurrently, take the first success in
    /// declaration order.
    Parallel,
}

/// Renders a prompt and sends it to one or more model routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStep {
    pub prompt_id: PromptId,
    /// Variable bindings; values may contain `{{input.*}}` and
    /// `{{steps.*}}` expressions resolved at run time.
    #[serde(default)]
    pub variables: HashMap<String, String>,
    pub routes: Vec<ModelRoute>,
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl ConditionOperator {
    /// Whether this operator compares against a value at all.
    pub fn needs_value(&self) -> bool {
        !matches!(self, ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty)
    }

    pub fn evaluate(&self, actual: &Value, expected: Option<&str>) -> DomainResult<bool> {
        let expected = || {
            expected.ok_or_else(|| {
                DomainError::validation(format!("operator {self:?} requires a value"))
            })
        };
        match self {
            ConditionOperator::Equals => Ok(value_as_text(actual) == expected()?),
            ConditionOperator::NotEquals => Ok(value_as_text(actual) != expected()?),
            ConditionOperator::GreaterThan => {
                let (a, b) = numbers(actual, expected()?)?;
                Ok(a > b)
            }
            ConditionOperator::GreaterThanOrEqual => {
                let (a, b) = numbers(actual, expected()?)?;
                Ok(a >= b)
            }
            ConditionOperator::LessThan => {
                let (a, b) = numbers(actual, expected()?)?;
                Ok(a < b)
            }
            ConditionOperator::LessThanOrEqual => {
                let (a, b) = numbers(actual, expected()?)?;
                Ok(a <= b)
            }
            ConditionOperator::Contains => Ok(value_as_text(actual).contains(expected()?)),
            ConditionOperator::NotContains => Ok(!value_as_text(actual).contains(expected()?)),
            ConditionOperator::StartsWith => Ok(value_as_text(actual).starts_with(expected()?)),
            ConditionOperator::EndsWith => Ok(value_as_text(actual).ends_with(expected()?)),
            ConditionOperator::IsEmpty => Ok(is_empty(actual)),
            ConditionOperator::IsNotEmpty => Ok(!is_empty(actual)),
        }
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numbers(actual: &Value, expected: &str) -> DomainResult<(f64, f64)> {
    let a = match actual {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| DomainError::validation(format!("'{actual}' is not a number")))?;
    let b = expected
        .parse()
        .map_err(|_| DomainError::validation(format!("'{expected}' is not a number")))?;
    Ok((a, b))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// What a condition or decision does when it fires.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BranchAction {
    #[default]
    Continue,
    GoToStep {
        step: String,
    },
    EndWorkflow {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
}

/// Routes execution based on a single predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionStep {
    /// Expression evaluated against the run context, e.g.
    /// `{{steps.classify.content}}`.
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub then: BranchAction,
    #[serde(default)]
    pub otherwise: BranchAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    /// Dig into a JSON value by dotted path.
    ExtractPath { path: String },
    Uppercase,
    Lowercase,
    Trim,
    /// Parse a string as JSON.
    ParseJson,
    /// Re-render a template against the run context, ignoring `input`.
    Template { template: String },
}

/// Reshapes data flowing between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    /// Expression producing the value to transform.
    pub input: String,
    #[serde(flatten)]
    pub op: TransformOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayStep {
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

/// Calls an external HTTP endpoint with the step's templated payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookStep {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// When false, a non-2xx response is recorded but does not fail the step.
    #[serde(default = "default_true")]
    pub fail_on_error: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionArm {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub then: BranchAction,
}

/// Multi-armed branch. Arms are evaluated in order, first match wins;
/// `default_action` applies when none match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionStep {
    pub arms: Vec<DecisionArm>,
    #[serde(default)]
    pub default_action: BranchAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepType {
    Prompt(PromptStep),
    Condition(ConditionStep),
    Transform(TransformStep),
    Delay(DelayStep),
    Webhook(WebhookStep),
    Decision(DecisionStep),
}

impl StepType {
    /// Step names this step may jump to.
    pub fn branch_targets(&self) -> Vec<&str> {
        fn target(action: &BranchAction) -> Option<&str> {
            match action {
                BranchAction::GoToStep { step } => Some(step.as_str()),
                _ => None,
            }
        }
        match self {
            StepType::Condition(c) => [target(&c.then), target(&c.otherwise)]
                .into_iter()
                .flatten()
                .collect(),
            StepType::Decision(d) => d
                .arms
                .iter()
                .filter_map(|arm| target(&arm.then))
                .chain(target(&d.default_action))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            StepType::Prompt(p) => {
                if p.routes.is_empty() {
                    return Err(DomainError::validation(
                        "prompt step needs at least one model route",
                    ));
                }
                Ok(())
            }
            StepType::Condition(c) => {
                if c.operator.needs_value() && c.value.is_none() {
                    return Err(DomainError::validation(format!(
                        "operator {:?} requires a value",
                        c.operator
                    )));
                }
                Ok(())
            }
            StepType::Decision(d) => {
                if d.arms.is_empty() {
                    return Err(DomainError::validation("decision step needs at least one arm"));
                }
                for arm in &d.arms {
                    if arm.operator.needs_value() && arm.value.is_none() {
                        return Err(DomainError::validation(format!(
                            "operator {:?} requires a value",
                            arm.operator
                        )));
                    }
                }
                Ok(())
            }
            StepType::Delay(d) => {
                if d.duration_ms == 0 || d.duration_ms > MAX_DELAY_MS {
                    return Err(DomainError::validation(format!(
                        "delay must be between 1 and {MAX_DELAY_MS} ms"
                    )));
                }
                Ok(())
            }
            StepType::Webhook(w) => {
                if !w.url.starts_with("http://") && !w.url.starts_with("https://") {
                    return Err(DomainError::validation(format!(
                        "webhook url must be http(s), got '{}'",
                        w.url
                    )));
                }
                Ok(())
            }
            StepType::Transform(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_equals() {
        let op = ConditionOperator::Equals;
        assert!(op.evaluate(&json!("yes"), Some("yes")).unwrap());
        assert!(!op.evaluate(&json!("no"), Some("yes")).unwrap());
        assert!(op.evaluate(&json!(42), Some("42")).unwrap());
    }

    #[test]
    fn test_operator_numeric_comparison() {
        let gt = ConditionOperator::GreaterThan;
        assert!(gt.evaluate(&json!(10), Some("5")).unwrap());
        assert!(gt.evaluate(&json!("10.5"), Some("10")).unwrap());
        assert!(gt.evaluate(&json!("abc"), Some("5")).is_err());
    }

    #[test]
    fn test_operator_inclusive_bounds() {
        let gte = ConditionOperator::GreaterThanOrEqual;
        assert!(gte.evaluate(&json!(5), Some("5")).unwrap());
        assert!(!gte.evaluate(&json!(4), Some("5")).unwrap());
        let lte = ConditionOperator::LessThanOrEqual;
        assert!(lte.evaluate(&json!(5), Some("5")).unwrap());
    }

    #[test]
    fn test_operator_affixes() {
        let starts = ConditionOperator::StartsWith;
        assert!(starts.evaluate(&json!("error: timeout"), Some("error")).unwrap());
        let ends = ConditionOperator::EndsWith;
        assert!(ends.evaluate(&json!("report.pdf"), Some(".pdf")).unwrap());
        assert!(!ends.evaluate(&json!("report.pdf"), Some(".csv")).unwrap());
    }

    #[test]
    fn test_operator_contains() {
        let op = ConditionOperator::Contains;
        assert!(op.evaluate(&json!("hello world"), Some("world")).unwrap());
        assert!(!op
            .evaluate(&json!("hello world"), Some("mars"))
            .unwrap());
    }

    #[test]
    fn test_operator_is_empty() {
        let op = ConditionOperator::IsEmpty;
        assert!(op.evaluate(&Value::Null, None).unwrap());
        assert!(op.evaluate(&json!(""), None).unwrap());
        assert!(op.evaluate(&json!([]), None).unwrap());
        assert!(!op.evaluate(&json!("x"), None).unwrap());
        assert!(!op.evaluate(&json!(0), None).unwrap());
    }

    #[test]
    fn test_operator_missing_value_errors() {
        let op = ConditionOperator::Equals;
        assert!(op.evaluate(&json!("x"), None).is_err());
    }

    #[test]
    fn test_step_type_serde_tagging() {
        let step = StepType::Delay(DelayStep { duration_ms: 500 });
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "delay");
        assert_eq!(json["duration_ms"], 500);
        let back: StepType = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_branch_action_serde() {
        let action: BranchAction =
            serde_json::from_value(json!({"action": "go_to_step", "step": "retry"})).unwrap();
        assert_eq!(action, BranchAction::GoToStep { step: "retry".to_string() });

        let default: BranchAction = serde_json::from_value(json!({"action": "continue"})).unwrap();
        assert_eq!(default, BranchAction::Continue);
    }

    #[test]
    fn test_delay_validation() {
        assert!(StepType::Delay(DelayStep { duration_ms: 0 }).validate().is_err());
        assert!(
            StepType::Delay(DelayStep { duration_ms: MAX_DELAY_MS + 1 })
                .validate()
                .is_err()
        );
        assert!(StepType::Delay(DelayStep { duration_ms: 1_000 }).validate().is_ok());
    }

    #[test]
    fn test_webhook_url_validation() {
        let step = StepType::Webhook(WebhookStep {
            url: "ftp://example.com".to_string(),
            method: HttpMethod::Post,
            headers: HashMap::new(),
            body: None,
            fail_on_error: true,
        });
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_condition_requires_value_for_equals() {
        let step = StepType::Condition(ConditionStep {
            field: "{{input.x}}".to_string(),
            operator: ConditionOperator::Equals,
            value: None,
            then: BranchAction::Continue,
            otherwise: BranchAction::Continue,
        });
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_branch_targets() {
        let step = StepType::Decision(DecisionStep {
            arms: vec![DecisionArm {
                field: "{{input.kind}}".to_string(),
                operator: ConditionOperator::Equals,
                value: Some("a".to_string()),
                then: BranchAction::GoToStep { step: "handle-a".to_string() },
            }],
            default_action: BranchAction::GoToStep { step: "fallthrough".to_string() },
        });
        assert_eq!(step.branch_targets(), vec!["handle-a", "fallthrough"]);
    }
}
