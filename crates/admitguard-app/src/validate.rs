//! The validation orchestrator.
//!
//! One call walks Fetching, then Matching/Evaluating per policy, then Aggregating and
//! Dispatching. A fetch, compile, or evaluation failure ends the call before Dispatching, so
//! sinks only ever see complete summaries.

use crate::cache::RuleCache;
use crate::{Context, PolicySource, PolicyValidationSink, SinkFailure, ValidateError};
use admitguard_domain::{
    CancelToken, EvalError, RuleEngine, ScriptEngine, SinkFailureMode, ValidatorOptions, applies,
};
use admitguard_types::{Entity, Policy, PolicyValidation, PolicyValidationSummary, Value};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A summary plus the sinks that did not accept it.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub summary: PolicyValidationSummary,
    pub sink_failures: Vec<SinkFailure>,
}

/// Validates entities against the policy set of a [`PolicySource`] and fans non-empty
/// summaries out to every sink.
pub struct Validator<E: RuleEngine = ScriptEngine> {
    pub(crate) source: Arc<dyn PolicySource>,
    pub(crate) sinks: Vec<Arc<dyn PolicyValidationSink>>,
    pub(crate) options: ValidatorOptions,
    evaluator: Arc<Evaluator<E>>,
}

impl Validator<ScriptEngine> {
    pub fn new(
        source: Arc<dyn PolicySource>,
        write_compliance: bool,
        validation_type: impl Into<String>,
        sinks: Vec<Arc<dyn PolicyValidationSink>>,
    ) -> Self {
        Self::with_options(
            source,
            sinks,
            ValidatorOptions::new(validation_type, write_compliance),
        )
    }

    pub fn with_options(
        source: Arc<dyn PolicySource>,
        sinks: Vec<Arc<dyn PolicyValidationSink>>,
        options: ValidatorOptions,
    ) -> Self {
        Self::with_engine(ScriptEngine, source, sinks, options)
    }
}

impl<E: RuleEngine> Validator<E> {
    pub fn with_engine(
        engine: E,
        source: Arc<dyn PolicySource>,
        sinks: Vec<Arc<dyn PolicyValidationSink>>,
        options: ValidatorOptions,
    ) -> Self {
        let evaluator = Evaluator {
            engine,
            timeout: options.evaluation_timeout,
            cache: options.cache_rules.then(RuleCache::new),
            pool: build_pool(options.parallelism),
            sequential: options.is_sequential(),
        };
        Self {
            source,
            sinks,
            options,
            evaluator: Arc::new(evaluator),
        }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Number of compiled rules currently cached.
    pub fn cached_rules(&self) -> usize {
        self.evaluator.cache.as_ref().map_or(0, RuleCache::len)
    }

    /// Validate `entity` and return its summary.
    ///
    /// Sink failures follow the configured [`SinkFailureMode`]: logged and dropped under
    /// `Report`, returned as [`ValidateError::Sink`] under `Propagate`.
    pub async fn validate(
        &self,
        ctx: &Context,
        entity: &Entity,
        trigger: Option<&str>,
    ) -> Result<PolicyValidationSummary, ValidateError> {
        let outcome = self.run(ctx, entity, trigger).await?;
        match self.options.sink_failure {
            SinkFailureMode::Propagate if !outcome.sink_failures.is_empty() => {
                Err(ValidateError::Sink(outcome.sink_failures))
            }
            _ => Ok(outcome.summary),
        }
    }

    /// Like [`Validator::validate`], but always hands back sink failures with the summary.
    #[tracing::instrument(
        name = "validate",
        skip_all,
        fields(entity = %entity.id, kind = %entity.kind, trigger = trigger.unwrap_or("-"))
    )]
    pub async fn run(
        &self,
        ctx: &Context,
        entity: &Entity,
        trigger: Option<&str>,
    ) -> Result<ValidationOutcome, ValidateError> {
        let policies = match ctx.run_until_cancelled(self.source.get_all(ctx)).await {
            Some(fetched) => fetched.map_err(ValidateError::Source)?,
            None => return Err(ValidateError::Cancelled),
        };
        if let Some(cache) = &self.evaluator.cache {
            cache.prune(&policies);
        }

        let applicable: Vec<Policy> = policies
            .into_iter()
            .filter(|policy| {
                let matched = applies(policy, entity);
                if !matched {
                    tracing::debug!(policy = %policy.id, "policy does not apply");
                }
                matched
            })
            .collect();

        let evaluated = self.evaluate(ctx, entity, applicable).await?;

        let mut summary = PolicyValidationSummary::default();
        for (policy, reasons) in evaluated {
            if reasons.is_empty() && !self.options.write_compliance {
                continue;
            }
            summary.push(PolicyValidation::new(
                policy,
                entity.clone(),
                self.options.validation_type.clone(),
                trigger.map(str::to_string),
                reasons,
            ));
        }
        tracing::info!(
            violations = summary.violations.len(),
            compliances = summary.compliances.len(),
            "entity validated"
        );

        if summary.is_empty() {
            return Ok(ValidationOutcome::default());
        }
        let sink_failures = self.dispatch(ctx, &summary).await?;
        Ok(ValidationOutcome {
            summary,
            sink_failures,
        })
    }

    async fn evaluate(
        &self,
        ctx: &Context,
        entity: &Entity,
        policies: Vec<Policy>,
    ) -> Result<Vec<(Policy, Vec<String>)>, ValidateError> {
        if policies.is_empty() {
            return Ok(Vec::new());
        }
        if ctx.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }

        let caller = ctx.token().clone();
        let evaluator = Arc::clone(&self.evaluator);
        let input = entity.document.clone();

        tokio::task::spawn_blocking(move || evaluator.evaluate_all(policies, &input, &caller))
            .await
            .map_err(|err| ValidateError::Join(err.to_string()))?
    }

    async fn dispatch(
        &self,
        ctx: &Context,
        summary: &PolicyValidationSummary,
    ) -> Result<Vec<SinkFailure>, ValidateError> {
        if ctx.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }

        let writes = self.sinks.iter().map(|sink| async move {
            let written = ctx.run_until_cancelled(sink.write(ctx, summary)).await;
            (sink.name().to_string(), written)
        });

        let mut failures = Vec::new();
        let mut cancelled = false;
        for (sink, written) in futures::future::join_all(writes).await {
            match written {
                Some(Ok(())) => {}
                Some(Err(error)) => {
                    tracing::warn!(sink = %sink, "sink failed to accept summary: {error:#}");
                    failures.push(SinkFailure { sink, error });
                }
                None => cancelled = true,
            }
        }

        if cancelled {
            return Err(ValidateError::Cancelled);
        }
        Ok(failures)
    }
}

/// The CPU-bound half of a validator, moved onto the blocking pool per call.
struct Evaluator<E: RuleEngine> {
    engine: E,
    timeout: Option<Duration>,
    cache: Option<RuleCache<E::Program>>,
    pool: Option<rayon::ThreadPool>,
    sequential: bool,
}

impl<E: RuleEngine> Evaluator<E> {
    /// Evaluate every policy; the first failure stops the rest.
    ///
    /// `caller` is the context's token. The time budget starts when evaluation does.
    fn evaluate_all(
        &self,
        policies: Vec<Policy>,
        input: &Value,
        caller: &CancelToken,
    ) -> Result<Vec<(Policy, Vec<String>)>, ValidateError> {
        let budget = caller.child_with_deadline(self.timeout.map(|t| Instant::now() + t));
        let stop = budget.child();

        let eval = |policy: Policy| {
            let result = self
                .evaluate_one(&policy, input, &stop)
                .map_err(|err| match err {
                    ValidateError::Cancelled => self.interrupted(&policy, caller, &budget),
                    err => err,
                });
            if result.is_err() {
                stop.cancel();
            }
            result.map(|reasons| (policy, reasons))
        };

        let results = if self.sequential || policies.len() == 1 {
            policies.into_iter().map(eval).collect::<Vec<_>>()
        } else if let Some(pool) = &self.pool {
            pool.install(|| policies.into_par_iter().map(eval).collect::<Vec<_>>())
        } else {
            policies.into_par_iter().map(eval).collect::<Vec<_>>()
        };
        settle(results)
    }

    fn evaluate_one(
        &self,
        policy: &Policy,
        input: &Value,
        token: &CancelToken,
    ) -> Result<Vec<String>, ValidateError> {
        if token.is_cancelled() {
            return Err(ValidateError::Cancelled);
        }

        let program = match &self.cache {
            Some(cache) => cache.get_or_compile(&self.engine, policy),
            None => self.engine.compile(policy).map(Arc::new),
        }
        .map_err(|source| ValidateError::Compile {
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            source,
        })?;

        self.engine
            .evaluate(&program, input, &policy.parameters, token)
            .map_err(|source| match source {
                EvalError::Cancelled => ValidateError::Cancelled,
                source => ValidateError::Evaluation {
                    policy_id: policy.id.clone(),
                    policy_name: policy.name.clone(),
                    source,
                },
            })
    }

    /// Attribute an interrupted evaluation: the caller's cancellation wins, then an expired
    /// budget, and anything else was stopped by a sibling's failure.
    fn interrupted(
        &self,
        policy: &Policy,
        caller: &CancelToken,
        budget: &CancelToken,
    ) -> ValidateError {
        match self.timeout {
            Some(timeout) if budget.is_cancelled() && !caller.is_cancelled() => {
                tracing::warn!(policy = %policy.id, ?timeout, "policy exceeded the evaluation timeout");
                ValidateError::Timeout {
                    policy_id: policy.id.clone(),
                    policy_name: policy.name.clone(),
                    timeout,
                }
            }
            _ => ValidateError::Cancelled,
        }
    }
}

/// Keep policy order; an authoring failure wins over the cancellations it caused.
fn settle<T>(results: Vec<Result<T, ValidateError>>) -> Result<Vec<T>, ValidateError> {
    let mut values = Vec::with_capacity(results.len());
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(ValidateError::Cancelled) => cancelled = true,
            Err(err) => return Err(err),
        }
    }
    if cancelled {
        return Err(ValidateError::Cancelled);
    }
    Ok(values)
}

fn build_pool(parallelism: usize) -> Option<rayon::ThreadPool> {
    if parallelism <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism)
        .thread_name(|i| format!("admitguard-eval-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!("evaluation pool unavailable, using the global pool: {err}");
            None
        }
    }
}
