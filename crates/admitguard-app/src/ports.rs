//! Boundaries to the hosting system.
//!
//! Adapters return `anyhow::Result` so they can attach their own context; the orchestrator
//! classifies failures into [`ValidateError`](crate::ValidateError) variants.

use crate::Context;
use admitguard_types::{EntitiesList, ListOptions, Policy, PolicyValidationSummary};
use async_trait::async_trait;

/// Where the current policy set comes from. Read-only from the orchestrator's side.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn get_all(&self, ctx: &Context) -> anyhow::Result<Vec<Policy>>;
}

/// Receives every non-empty summary, once per validated entity.
#[async_trait]
pub trait PolicyValidationSink: Send + Sync {
    /// Name used in logs and [`SinkFailure`](crate::SinkFailure).
    fn name(&self) -> &str;

    async fn write(&self, ctx: &Context, summary: &PolicyValidationSummary) -> anyhow::Result<()>;
}

/// Enumerates entities of one kind, page by page.
#[async_trait]
pub trait EntitySource: Send + Sync {
    fn kind(&self) -> &str;

    async fn list(&self, ctx: &Context, options: &ListOptions) -> anyhow::Result<EntitiesList>;
}
