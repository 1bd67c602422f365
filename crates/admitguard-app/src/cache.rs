use admitguard_domain::fingerprint::fingerprint_for_rule;
use admitguard_domain::{CompileError, RuleEngine};
use admitguard_types::Policy;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Read-through cache of compiled rules, keyed by policy ID.
///
/// Each entry remembers the fingerprint of the code it was compiled from; a policy whose
/// code or declared parameters changed is recompiled and replaces the entry. Compilation
/// runs without holding a shard lock, so a slow compile never blocks lookups of other
/// policies.
pub struct RuleCache<P> {
    entries: DashMap<String, CachedRule<P>>,
}

struct CachedRule<P> {
    fingerprint: String,
    program: Arc<P>,
}

impl<P> Default for RuleCache<P> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<P> RuleCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, policy_id: &str) -> bool {
        self.entries.contains_key(policy_id)
    }

    /// Compiled program for `policy`, compiling on a miss or a stale fingerprint.
    pub fn get_or_compile<E>(&self, engine: &E, policy: &Policy) -> Result<Arc<P>, CompileError>
    where
        E: RuleEngine<Program = P>,
    {
        let fingerprint = fingerprint_for_rule(policy);
        if let Some(entry) = self.entries.get(&policy.id)
            && entry.fingerprint == fingerprint
        {
            tracing::debug!(policy = %policy.id, "compiled rule cache hit");
            return Ok(Arc::clone(&entry.program));
        }

        tracing::debug!(policy = %policy.id, "compiled rule cache miss");
        let program = Arc::new(engine.compile(policy)?);
        self.entries.insert(
            policy.id.clone(),
            CachedRule {
                fingerprint,
                program: Arc::clone(&program),
            },
        );
        Ok(program)
    }

    /// Drop entries for policies that are no longer in the current set.
    pub fn prune(&self, current: &[Policy]) {
        let live: HashSet<&str> = current.iter().map(|p| p.id.as_str()).collect();
        self.entries.retain(|id, _| live.contains(id.as_str()));
    }
}
