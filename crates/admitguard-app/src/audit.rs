//! Periodic audit: validate every entity an [`EntitySource`] lists.

use crate::{Context, EntitySource, ValidateError, Validator};
use admitguard_domain::RuleEngine;
use admitguard_types::ListOptions;
use futures::StreamExt;

/// Totals of one audit sweep.
#[derive(Debug, Default)]
pub struct AuditReport {
    /// Entities validated successfully.
    pub entities: usize,
    pub violations: usize,
    pub compliances: usize,
    pub failures: Vec<AuditFailure>,
}

/// An entity whose validation failed; the sweep carries on without it.
#[derive(Debug)]
pub struct AuditFailure {
    pub entity_id: String,
    pub error: ValidateError,
}

impl<E: RuleEngine> Validator<E> {
    /// Page through `source` and validate its entities, at most `concurrency` at a time.
    ///
    /// A listing failure or cancellation aborts the sweep. Any other per-entity failure is
    /// recorded in the report.
    #[tracing::instrument(name = "audit", skip_all, fields(kind = %source.kind()))]
    pub async fn audit(
        &self,
        ctx: &Context,
        source: &dyn EntitySource,
        trigger: Option<&str>,
        concurrency: usize,
    ) -> Result<AuditReport, ValidateError> {
        let mut report = AuditReport::default();
        let mut options = ListOptions::default();

        loop {
            let page = match ctx.run_until_cancelled(source.list(ctx, &options)).await {
                Some(listed) => listed.map_err(ValidateError::Listing)?,
                None => return Err(ValidateError::Cancelled),
            };

            let results: Vec<_> = futures::stream::iter(page.entities)
                .map(|entity| async move {
                    let result = self.validate(ctx, &entity, trigger).await;
                    (entity.id, result)
                })
                .buffer_unordered(concurrency.max(1))
                .collect()
                .await;

            for (entity_id, result) in results {
                match result {
                    Ok(summary) => {
                        report.entities += 1;
                        report.violations += summary.violations.len();
                        report.compliances += summary.compliances.len();
                    }
                    Err(ValidateError::Cancelled) if ctx.is_cancelled() => {
                        return Err(ValidateError::Cancelled);
                    }
                    Err(error) => {
                        tracing::warn!(entity = %entity_id, "audit validation failed: {error}");
                        report.failures.push(AuditFailure { entity_id, error });
                    }
                }
            }

            match page.continue_token {
                Some(token) if page.has_next => options.continue_token = Some(token),
                _ => break,
            }
        }

        tracing::info!(
            entities = report.entities,
            violations = report.violations,
            compliances = report.compliances,
            failures = report.failures.len(),
            "audit finished"
        );
        Ok(report)
    }
}
