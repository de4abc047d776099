//! # Evaluation Engine
//!
//! Runs every objective of an evaluation definition through its provider and
//! the threshold comparator, then folds the verdicts into one state.

use super::comparator::compare;
use super::resolver::{ProviderResolver, ResolveError};
use crate::crd::{EvaluationDefinition, LifecycleState, Objective};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures that abort an evaluation without judging it
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to resolve provider {provider}: {source}")]
    Resolve {
        provider: String,
        #[source]
        source: ResolveError,
    },
}

/// Outcome of one objective
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationVerdict {
    pub objective: String,
    /// Provider that answered, or was meant to answer, the query
    pub provider: String,
    pub value: String,
    pub message: Option<String>,
    pub state: LifecycleState,
}

impl EvaluationVerdict {
    fn failed(objective: &Objective, provider: &str, value: String, message: String) -> Self {
        Self {
            objective: objective.name.clone(),
            provider: provider.to_ascii_lowercase(),
            value,
            message: Some(message),
            state: LifecycleState::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    /// `Succeeded` iff every verdict succeeded
    pub state: LifecycleState,
    pub verdicts: Vec<EvaluationVerdict>,
}

/// Evaluate all objectives of `definition`
///
/// Provider and threshold problems fail the objective and evaluation moves on.
///
/// # Errors
///
/// Returns an error only for transient store failures while resolving a provider.
pub async fn evaluate(
    namespace: &str,
    definition: &EvaluationDefinition,
    resolver: &dyn ProviderResolver,
) -> Result<EvaluationOutcome, EngineError> {
    let mut verdicts = Vec::with_capacity(definition.spec.objectives.len());

    for objective in &definition.spec.objectives {
        let provider_name = definition.provider_for(objective);
        let verdict = evaluate_objective(namespace, objective, provider_name, resolver).await?;
        debug!(
            "Objective {} of {}: value={:?} state={}",
            verdict.objective,
            definition.name(),
            verdict.value,
            verdict.state
        );
        verdicts.push(verdict);
    }

    let state = if verdicts.iter().all(|v| v.state.is_succeeded()) {
        LifecycleState::Succeeded
    } else {
        LifecycleState::Failed
    };

    info!(
        "Evaluation {} in {} finished: {} ({} objectives)",
        definition.name(),
        namespace,
        state,
        verdicts.len()
    );

    Ok(EvaluationOutcome { state, verdicts })
}

async fn evaluate_objective(
    namespace: &str,
    objective: &Objective,
    provider_name: &str,
    resolver: &dyn ProviderResolver,
) -> Result<EvaluationVerdict, EngineError> {
    let resolved = match resolver.resolve(namespace, provider_name).await {
        Ok(resolved) => resolved,
        Err(e) if e.is_transient() => {
            return Err(EngineError::Resolve {
                provider: provider_name.to_string(),
                source: e,
            });
        }
        Err(e) => {
            warn!("Objective {}: {}", objective.name, e);
            return Ok(EvaluationVerdict::failed(
                objective,
                provider_name,
                String::new(),
                e.to_string(),
            ));
        }
    };

    let provider = resolved.provider.name();
    let value = match resolved
        .provider
        .evaluate_query(
            &objective.query,
            &resolved.target_server,
            resolved.credentials.as_ref(),
        )
        .await
    {
        Ok(value) => value,
        Err(e) => {
            warn!("Objective {} query against {} failed: {}", objective.name, provider, e);
            return Ok(EvaluationVerdict::failed(
                objective,
                provider,
                String::new(),
                e.to_string(),
            ));
        }
    };

    match compare(&value, &objective.evaluation_target) {
        Ok(passed) => Ok(EvaluationVerdict {
            objective: objective.name.clone(),
            provider: provider.to_string(),
            value,
            message: None,
            state: if passed {
                LifecycleState::Succeeded
            } else {
                LifecycleState::Failed
            },
        }),
        Err(e) => Ok(EvaluationVerdict::failed(objective, provider, value, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::store::StoreError;
    use crate::crd::{EvaluationDefinitionSpec, KeptnEvaluationDefinition};
    use crate::evaluation::resolver::ResolvedProvider;
    use crate::provider::{Credentials, ProviderError, QueryProvider};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Returns a canned answer per query
    struct CannedProvider {
        answers: HashMap<String, Result<String, String>>,
    }

    #[async_trait]
    impl QueryProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "prometheus"
        }

        async fn evaluate_query(
            &self,
            query: &str,
            _target_server: &str,
            _credentials: Option<&Credentials>,
        ) -> Result<String, ProviderError> {
            match self.answers.get(query) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(message)) if message == "no values" => Err(ProviderError::NoValues),
                Some(Err(message)) => Err(ProviderError::Query(message.clone())),
                None => Err(ProviderError::NoValues),
            }
        }
    }

    enum Mode {
        Resolve(Arc<CannedProvider>),
        NotFound,
        StoreDown,
    }

    struct FakeResolver(Mode);

    #[async_trait]
    impl ProviderResolver for FakeResolver {
        async fn resolve(
            &self,
            _namespace: &str,
            provider: &str,
        ) -> Result<ResolvedProvider, ResolveError> {
            match &self.0 {
                Mode::Resolve(p) => Ok(ResolvedProvider {
                    provider: Arc::clone(p) as Arc<dyn QueryProvider>,
                    target_server: "http://prometheus:9090".to_string(),
                    credentials: None,
                }),
                Mode::NotFound => Err(ResolveError::NotFound(provider.to_string())),
                Mode::StoreDown => Err(ResolveError::Store(StoreError::Serialization(
                    serde_json::from_str::<u32>("{").unwrap_err(),
                ))),
            }
        }
    }

    fn canned(answers: &[(&str, Result<&str, &str>)]) -> FakeResolver {
        FakeResolver(Mode::Resolve(Arc::new(CannedProvider {
            answers: answers
                .iter()
                .map(|(q, a)| {
                    (
                        (*q).to_string(),
                        a.map(str::to_string).map_err(str::to_string),
                    )
                })
                .collect(),
        })))
    }

    fn definition(objectives: &[(&str, &str, &str)]) -> EvaluationDefinition {
        KeptnEvaluationDefinition::new(
            "app-pre-deploy-eval",
            EvaluationDefinitionSpec {
                source: "prometheus".to_string(),
                objectives: objectives
                    .iter()
                    .map(|(name, query, target)| Objective {
                        name: (*name).to_string(),
                        query: (*query).to_string(),
                        evaluation_target: (*target).to_string(),
                        provider: None,
                    })
                    .collect(),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_all_objectives_pass() {
        let resolver = canned(&[("cpu", Ok("75")), ("rps", Ok("600"))]);
        let def = definition(&[("cpu", "cpu", "<80"), ("rps", "rps", ">500")]);

        let outcome = evaluate("demo", &def, &resolver).await.unwrap();

        assert_eq!(outcome.state, LifecycleState::Succeeded);
        assert_eq!(outcome.verdicts.len(), 2);
        assert_eq!(outcome.verdicts[0].value, "75");
        assert_eq!(outcome.verdicts[1].provider, "prometheus");
    }

    #[tokio::test]
    async fn test_one_failing_objective_fails_the_definition() {
        let resolver = canned(&[("cpu", Ok("95")), ("rps", Ok("600"))]);
        let def = definition(&[("cpu", "cpu", "<80"), ("rps", "rps", ">500")]);

        let outcome = evaluate("demo", &def, &resolver).await.unwrap();

        assert_eq!(outcome.state, LifecycleState::Failed);
        assert_eq!(outcome.verdicts[0].state, LifecycleState::Failed);
        assert!(outcome.verdicts[0].message.is_none());
        assert_eq!(outcome.verdicts[1].state, LifecycleState::Succeeded);
    }

    #[tokio::test]
    async fn test_provider_errors_become_failed_verdicts() {
        let resolver = canned(&[("empty", Err("no values")), ("rps", Ok("600"))]);
        let def = definition(&[("empty", "empty", ">1"), ("rps", "rps", ">500")]);

        let outcome = evaluate("demo", &def, &resolver).await.unwrap();

        assert_eq!(outcome.state, LifecycleState::Failed);
        assert_eq!(outcome.verdicts[0].message.as_deref(), Some("no values"));
        // Evaluation carries on after a failed objective
        assert_eq!(outcome.verdicts[1].state, LifecycleState::Succeeded);
    }

    #[tokio::test]
    async fn test_malformed_value_and_target_are_failed_verdicts() {
        let resolver = canned(&[("text", Ok("abc")), ("cpu", Ok("1"))]);
        let def = definition(&[("text", "text", ">500"), ("cpu", "cpu", "x5")]);

        let outcome = evaluate("demo", &def, &resolver).await.unwrap();

        assert!(outcome
            .verdicts
            .iter()
            .all(|v| v.state.is_failed() && v.message.is_some()));
        assert_eq!(outcome.verdicts[0].value, "abc");
    }

    #[tokio::test]
    async fn test_unknown_provider_resource_is_failed_verdict() {
        let resolver = FakeResolver(Mode::NotFound);
        let def = definition(&[("cpu", "cpu", "<80")]);

        let outcome = evaluate("demo", &def, &resolver).await.unwrap();

        assert_eq!(outcome.state, LifecycleState::Failed);
        assert!(outcome.verdicts[0]
            .message
            .as_deref()
            .unwrap()
            .contains("not found"));
    }

    #[tokio::test]
    async fn test_store_failure_aborts_evaluation() {
        let resolver = FakeResolver(Mode::StoreDown);
        let def = definition(&[("cpu", "cpu", "<80")]);

        let err = evaluate("demo", &def, &resolver).await.unwrap_err();
        assert!(matches!(err, EngineError::Resolve { .. }));
    }

    #[tokio::test]
    async fn test_no_objectives_succeeds() {
        let resolver = FakeResolver(Mode::NotFound);
        let outcome = evaluate("demo", &definition(&[]), &resolver).await.unwrap();
        assert_eq!(outcome.state, LifecycleState::Succeeded);
        assert!(outcome.verdicts.is_empty());
    }
}
