use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, error, info, warn};
use webwarden_ai::{
    Chunker, InferenceError, InferencePort, LabelSpace, TokenCounter, aggregate, check_prediction,
};
use webwarden_core::{
    AggregateDecision, BlockedDomainEntry, ChunkPrediction, ClassificationRequest, DecisionResult,
    registrable_domain,
};
use webwarden_store::{CategoryDirectory, DomainLedger};

use crate::{DecisionError, EngineConfig};

/// Orchestrates chunking, inference, aggregation, and the block policy.
///
/// All collaborators are injected: the inference port and its token
/// counter, the label space that decodes model indices, the block ledger,
/// and the category directory. The engine keeps no per-request state, so
/// one instance serves concurrent requests.
pub struct PolicyEngine {
    inference: Arc<dyn InferencePort>,
    tokens: Arc<dyn TokenCounter>,
    labels: LabelSpace,
    ledger: Arc<dyn DomainLedger>,
    categories: Arc<dyn CategoryDirectory>,
    config: EngineConfig,
}

impl PolicyEngine {
    pub fn new(
        inference: Arc<dyn InferencePort>,
        tokens: Arc<dyn TokenCounter>,
        labels: LabelSpace,
        ledger: Arc<dyn DomainLedger>,
        categories: Arc<dyn CategoryDirectory>,
    ) -> Self {
        Self {
            inference,
            tokens,
            labels,
            ledger,
            categories,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide whether `domain` is blocked for `user_id` given the page `text`.
    ///
    /// A ledger hit returns immediately without inference. Otherwise the
    /// text is classified and, if the category is not on the user's active
    /// allow-list, the domain is recorded in the ledger before returning.
    /// Any error aborts before the ledger is written.
    pub async fn decide(
        &self,
        user_id: &str,
        domain: &str,
        text: &str,
    ) -> Result<DecisionResult, DecisionError> {
        if user_id.trim().is_empty() {
            return Err(DecisionError::InvalidRequest("user id is empty".into()));
        }
        let domain = registrable_domain(domain)?;
        validate_text(text)?;

        if self.config.exempt_domains.contains(&domain) {
            debug!(user = %user_id, domain = %domain, "exempt domain");
            return Ok(DecisionResult::exempt(&domain));
        }

        if self
            .ledger
            .exists(user_id, &domain, self.config.ledger_match)
            .await?
        {
            debug!(user = %user_id, domain = %domain, "ledger hit");
            return Ok(DecisionResult::ledger_hit(&domain));
        }

        let decision = self.classify_text(text).await?;
        let category = self.categories.get_or_create(&decision.category).await?;

        if self
            .categories
            .is_user_allowed(user_id, &category.name, Utc::now())
            .await?
        {
            info!(
                user = %user_id,
                domain = %domain,
                category = %category.name,
                confidence = decision.confidence,
                "allowed"
            );
            return Ok(DecisionResult::classified(decision, &domain, false));
        }

        let entry = BlockedDomainEntry::classified(user_id, &domain, &category.name, Utc::now());
        let inserted = self.ledger.insert(&entry).await?;
        info!(
            user = %user_id,
            domain = %domain,
            category = %category.name,
            confidence = decision.confidence,
            inserted,
            "blocked"
        );
        Ok(DecisionResult::classified(decision, &domain, true))
    }

    /// [`decide`](Self::decide) for a request value.
    pub async fn decide_request(
        &self,
        request: &ClassificationRequest,
    ) -> Result<DecisionResult, DecisionError> {
        self.decide(&request.user_id, &request.domain, &request.text)
            .await
    }

    /// Classify text without consulting or touching the ledger.
    pub async fn classify(&self, text: &str) -> Result<AggregateDecision, DecisionError> {
        validate_text(text)?;
        self.classify_text(text).await
    }

    async fn classify_text(&self, text: &str) -> Result<AggregateDecision, DecisionError> {
        let chunks: Vec<String> =
            Chunker::new(self.tokens.as_ref(), self.config.max_tokens_per_chunk)
                .chunks(text)
                .collect();
        if chunks.is_empty() {
            error!(bytes = text.len(), "chunker produced no chunks for validated text");
            return Err(DecisionError::EmptyInput);
        }

        let timeout = self.config.inference_timeout;
        // `buffered` yields in chunk order, which the tie-break depends on.
        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| self.predict(chunk, timeout))
            .collect();
        let predictions: Vec<ChunkPrediction> = stream::iter(pending)
            .buffered(self.config.max_concurrent_chunks.max(1))
            .try_collect()
            .await?;

        let vote = aggregate(&predictions)?;
        let decision = vote.decode(&self.labels)?;
        debug!(
            category = %decision.category,
            confidence = decision.confidence,
            chunks = decision.chunk_count,
            "aggregated"
        );
        Ok(decision)
    }

    async fn predict(
        &self,
        chunk: &str,
        timeout: Duration,
    ) -> Result<ChunkPrediction, InferenceError> {
        match tokio::time::timeout(timeout, self.inference.predict_chunk(chunk)).await {
            Ok(result) => result.and_then(check_prediction).inspect_err(|e| {
                warn!(error = %e, "chunk inference failed");
            }),
            Err(_) => {
                warn!(?timeout, "chunk inference timed out");
                Err(InferenceError::Timeout(timeout))
            }
        }
    }
}

fn validate_text(text: &str) -> Result<(), DecisionError> {
    if text.trim().is_empty() {
        return Err(DecisionError::InvalidRequest("text is empty".into()));
    }
    Ok(())
}
