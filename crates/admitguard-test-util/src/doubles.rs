use admitguard_app::{Context, EntitySource, PolicySource, PolicyValidationSink};
use admitguard_types::{
    EntitiesList, Entity, ListOptions, Policy, PolicyValidationSummary,
};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves a fixed (replaceable) policy set and counts fetches.
#[derive(Debug, Default)]
pub struct StaticPolicySource {
    policies: Mutex<Vec<Policy>>,
    calls: AtomicUsize,
}

impl StaticPolicySource {
    pub fn new(policies: Vec<Policy>) -> Self {
        Self {
            policies: Mutex::new(policies),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replace(&self, policies: Vec<Policy>) {
        *self.policies.lock().expect("policies lock") = policies;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    async fn get_all(&self, _ctx: &Context) -> anyhow::Result<Vec<Policy>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.policies.lock().expect("policies lock").clone())
    }
}

/// Always fails to fetch.
#[derive(Debug, Default)]
pub struct FailingPolicySource {
    calls: AtomicUsize,
}

impl FailingPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicySource for FailingPolicySource {
    async fn get_all(&self, _ctx: &Context) -> anyhow::Result<Vec<Policy>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("policy backend unavailable")
    }
}

/// Never answers; only cancellation ends a fetch.
#[derive(Debug, Default)]
pub struct PendingPolicySource;

#[async_trait]
impl PolicySource for PendingPolicySource {
    async fn get_all(&self, _ctx: &Context) -> anyhow::Result<Vec<Policy>> {
        std::future::pending().await
    }
}

/// Records every summary it is given.
#[derive(Debug)]
pub struct RecordingSink {
    name: String,
    writes: Mutex<Vec<PolicyValidationSummary>>,
}

impl RecordingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.lock().expect("writes lock").len()
    }

    pub fn summaries(&self) -> Vec<PolicyValidationSummary> {
        self.writes.lock().expect("writes lock").clone()
    }

    pub fn last(&self) -> Option<PolicyValidationSummary> {
        self.writes.lock().expect("writes lock").last().cloned()
    }
}

#[async_trait]
impl PolicyValidationSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _ctx: &Context, summary: &PolicyValidationSummary) -> anyhow::Result<()> {
        self.writes
            .lock()
            .expect("writes lock")
            .push(summary.clone());
        Ok(())
    }
}

/// Rejects every summary and counts attempts.
#[derive(Debug)]
pub struct FailingSink {
    name: String,
    calls: AtomicUsize,
}

impl FailingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyValidationSink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, _ctx: &Context, _summary: &PolicyValidationSummary) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("{} rejected the summary", self.name)
    }
}

/// Lists a fixed set of entities in pages of `page_size`. The continue token is the offset.
#[derive(Debug)]
pub struct StaticEntitySource {
    kind: String,
    entities: Vec<Entity>,
    page_size: usize,
    fail: bool,
    requests: Mutex<Vec<ListOptions>>,
}

impl StaticEntitySource {
    pub fn new(kind: impl Into<String>, entities: Vec<Entity>, page_size: usize) -> Self {
        Self {
            kind: kind.into(),
            entities,
            page_size: page_size.max(1),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A source whose every listing fails.
    pub fn failing(kind: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(kind, Vec::new(), 1)
        }
    }

    pub fn requests(&self) -> Vec<ListOptions> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl EntitySource for StaticEntitySource {
    fn kind(&self) -> &str {
        &self.kind
    }

    async fn list(&self, _ctx: &Context, options: &ListOptions) -> anyhow::Result<EntitiesList> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(options.clone());
        if self.fail {
            anyhow::bail!("cannot list {}", self.kind);
        }

        let start: usize = match options.continue_token.as_deref() {
            Some(token) => token.parse()?,
            None => 0,
        };
        let limit = options.limit.unwrap_or(self.page_size);
        let end = (start + limit).min(self.entities.len());
        let entities = self.entities.get(start..end).unwrap_or_default().to_vec();
        let has_next = end < self.entities.len();

        Ok(EntitiesList {
            entities,
            has_next,
            continue_token: has_next.then(|| end.to_string()),
        })
    }
}
