//! Structured generation with schema validation and a single repair retry.
//!
//! Model output is untrusted. Every response is deserialized into the expected Rust type
//! and checked; a violation triggers ONE re-prompt that shows the model its previous
//! output and the violation. A second violation is a hard failure for that call only.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::error::Elapsed;
use tracing::warn;

use crate::analysis::invoker::{invoke, CallGate, InvocationError, RetryPolicy};
use crate::analysis::models::{Component, Degradation, DegradationReason};
use crate::analysis::prompts::{fill_template, REPAIR_PROMPT_TEMPLATE};
use crate::llm_client::{SchemaDescriptor, StructuredGenerator};

/// Previous output is cut to this many characters in the repair prompt.
const MAX_ECHOED_OUTPUT_CHARS: usize = 2000;

#[derive(Debug, Clone, Error)]
#[error("response for '{schema}' violated schema: {reason}")]
pub struct SchemaError {
    pub schema: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Error)]
pub enum StructuredCallError {
    #[error("call failed: {0}")]
    Invocation(#[from] InvocationError),

    #[error("{0}")]
    Schema(#[from] SchemaError),
}

impl StructuredCallError {
    pub fn degradation_reason(&self) -> DegradationReason {
        match self {
            StructuredCallError::Invocation(_) => DegradationReason::Dependency,
            StructuredCallError::Schema(_) => DegradationReason::Schema,
        }
    }
}

/// Semantic checks that serde's typing cannot express. Defaults to none.
pub trait SchemaCheck: DeserializeOwned {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Deserializes `value` as `T` and runs its `SchemaCheck`.
pub fn validate<T: SchemaCheck>(schema: &SchemaDescriptor, value: Value) -> Result<T, SchemaError> {
    let parsed: T = serde_json::from_value(value).map_err(|e| SchemaError {
        schema: schema.name,
        reason: e.to_string(),
    })?;
    parsed.check().map_err(|reason| SchemaError {
        schema: schema.name,
        reason,
    })?;
    Ok(parsed)
}

/// Per-analysis handle for model calls: the shared generator, this request's call gate,
/// and the retry policy.
#[derive(Clone)]
pub struct StructuredCaller {
    generator: Arc<dyn StructuredGenerator>,
    gate: CallGate,
    policy: RetryPolicy,
}

impl StructuredCaller {
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        gate: CallGate,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            gate,
            policy,
        }
    }

    pub fn gate(&self) -> &CallGate {
        &self.gate
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One structured call: invoke with retries, validate, repair once on violation.
    pub async fn call<T: SchemaCheck>(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
    ) -> Result<T, StructuredCallError> {
        let first = self.generate(prompt, schema).await?;
        let echoed = render_for_repair(&first);

        let violation = match validate::<T>(schema, first) {
            Ok(parsed) => return Ok(parsed),
            Err(violation) => violation,
        };

        warn!(
            "{}: schema violation ({}), sending repair prompt",
            schema.name, violation.reason
        );

        let repair_prompt = fill_template(
            REPAIR_PROMPT_TEMPLATE,
            &[
                ("original_prompt", prompt),
                ("previous_output", echoed.as_str()),
                ("violation", violation.reason.as_str()),
            ],
        );

        let second = self.generate(&repair_prompt, schema).await?;
        Ok(validate::<T>(schema, second)?)
    }

    async fn generate(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
    ) -> Result<Value, InvocationError> {
        invoke(schema.name, &self.policy, &self.gate, || {
            self.generator.generate(prompt, schema)
        })
        .await
    }
}

fn render_for_repair(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.chars().take(MAX_ECHOED_OUTPUT_CHARS).collect()
}

/// Resolves one best-effort slice. On failure or deadline the slice's degradation is
/// recorded and `None` is returned so the caller falls back to the safe default.
pub fn settle<T>(
    component: Component,
    outcome: Result<Result<T, StructuredCallError>, Elapsed>,
    degradations: &mut Vec<Degradation>,
) -> Option<T> {
    let degradation = match outcome {
        Ok(Ok(value)) => return Some(value),
        Ok(Err(e)) => Degradation {
            component,
            reason: e.degradation_reason(),
            detail: e.to_string(),
        },
        Err(_) => Degradation {
            component,
            reason: DegradationReason::Timeout,
            detail: "analysis deadline elapsed before this step completed".to_string(),
        },
    };
    warn!(
        "{:?} degraded to default ({:?}): {}",
        degradation.component, degradation.reason, degradation.detail
    );
    degradations.push(degradation);
    None
}

/// Trims entries and drops blank ones.
pub fn clean_strings(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_support::{fast_policy, ScriptedGenerator};
    use crate::llm_client::CallErrorKind;
    use serde::Deserialize;
    use serde_json::json;

    const ITEMS_SCHEMA: SchemaDescriptor = SchemaDescriptor {
        name: "items",
        shape: r#"{"items": ["string"]}"#,
    };

    #[derive(Debug, Deserialize)]
    struct Items {
        items: Vec<String>,
    }

    impl SchemaCheck for Items {
        fn check(&self) -> Result<(), String> {
            if self.items.len() > 3 {
                return Err("at most 3 items allowed".to_string());
            }
            Ok(())
        }
    }

    fn caller(generator: Arc<ScriptedGenerator>) -> StructuredCaller {
        StructuredCaller::new(generator, CallGate::new(2), fast_policy())
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_response_needs_one_call() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.respond("items", json!({"items": ["a", "b"]}));

        let items: Items = caller(generator.clone())
            .call("list", &ITEMS_SCHEMA)
            .await
            .unwrap();
        assert_eq!(items.items, vec!["a", "b"]);
        assert_eq!(generator.calls_for("items"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schema_violation_is_repaired_once() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push("items", Ok(json!({"items": "not a list"})));
        generator.respond("items", json!({"items": ["fixed"]}));

        let items: Items = caller(generator.clone())
            .call("list", &ITEMS_SCHEMA)
            .await
            .unwrap();
        assert_eq!(items.items, vec!["fixed"]);
        assert_eq!(generator.calls_for("items"), 2);

        let repair = &generator.prompts_for("items")[1];
        assert!(repair.contains("not a list"));
        assert!(repair.contains("list"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_violation_is_schema_error() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.respond("items", json!({"items": ["1", "2", "3", "4"]}));

        let err = caller(generator.clone())
            .call::<Items>("list", &ITEMS_SCHEMA)
            .await
            .unwrap_err();
        assert!(matches!(err, StructuredCallError::Schema(_)));
        assert_eq!(err.degradation_reason(), DegradationReason::Schema);
        assert_eq!(generator.calls_for("items"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prose_output_gets_repair_prompt() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.push("items", Ok(Value::String("Here are your items!".to_string())));
        generator.respond("items", json!({"items": []}));

        let items: Items = caller(generator.clone())
            .call("list", &ITEMS_SCHEMA)
            .await
            .unwrap();
        assert!(items.items.is_empty());
        assert!(generator.prompts_for("items")[1].contains("Here are your items!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_failure_is_not_repaired() {
        let generator = Arc::new(ScriptedGenerator::new());
        generator.fail("items", CallErrorKind::Invalid);

        let err = caller(generator.clone())
            .call::<Items>("list", &ITEMS_SCHEMA)
            .await
            .unwrap_err();
        assert!(matches!(err, StructuredCallError::Invocation(_)));
        assert_eq!(err.degradation_reason(), DegradationReason::Dependency);
        assert_eq!(generator.calls_for("items"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_records_timeout() {
        let mut degradations = Vec::new();
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            futures::future::pending::<Result<(), StructuredCallError>>(),
        )
        .await;
        assert!(settle(Component::InterviewPrep, elapsed, &mut degradations).is_none());
        assert_eq!(degradations.len(), 1);
        assert_eq!(degradations[0].component, Component::InterviewPrep);
        assert_eq!(degradations[0].reason, DegradationReason::Timeout);
    }

    #[test]
    fn test_settle_passes_success_through() {
        let mut degradations = Vec::new();
        let value = settle(Component::RedFlags, Ok(Ok(vec!["x"])), &mut degradations);
        assert_eq!(value, Some(vec!["x"]));
        assert!(degradations.is_empty());
    }

    #[test]
    fn test_clean_strings_drops_blanks() {
        let cleaned = clean_strings(vec![" a ".to_string(), "   ".to_string(), "b".to_string()]);
        assert_eq!(cleaned, vec!["a", "b"]);
    }
}
