use std::collections::HashSet;
use std::time::Duration;

use webwarden_core::{DomainError, registrable_domain};
use webwarden_store::LedgerMatch;

/// Tunables for [`PolicyEngine`](crate::PolicyEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Token budget per chunk, under the model's vocabulary.
    pub max_tokens_per_chunk: usize,
    /// Chunk inferences in flight at once for one request.
    pub max_concurrent_chunks: usize,
    /// Deadline for each chunk inference call.
    pub inference_timeout: Duration,
    /// How incoming domains are matched against ledger entries.
    pub ledger_match: LedgerMatch,
    /// Registrable domains that are never classified or blocked.
    pub exempt_domains: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: 400,
            max_concurrent_chunks: 4,
            inference_timeout: Duration::from_secs(30),
            ledger_match: LedgerMatch::default(),
            exempt_domains: HashSet::new(),
        }
    }
}

impl EngineConfig {
    /// Add exempt domains, normalizing each to its registrable form.
    pub fn with_exempt_domains<I, S>(mut self, domains: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            self.exempt_domains
                .insert(registrable_domain(domain.as_ref())?);
        }
        Ok(self)
    }
}
