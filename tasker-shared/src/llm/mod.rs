//! LLM / embedding provider contracts (spec §1, §6).
//!
//! Both are pluggable, fallible external services. Consolidation's System
//! 2 extraction and optional Claude-style validation (spec §4.8) are the
//! callers; the kernel never assumes any particular vendor, only the
//! latency/failure shape stated in spec §6.

use async_trait::async_trait;

use crate::error::TaskerResult;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// text -> text completion. Transient failures should be returned as
    /// `TaskerError::Transient` so callers retry per the bounded-backoff
    /// policy (spec §7); permanent failures are any other error variant.
    async fn complete(&self, request: CompletionRequest) -> TaskerResult<String>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// text -> vector, dimensionality fixed per provider (e.g. 768).
    async fn embed(&self, text: &str) -> TaskerResult<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

/// A provider that always fails transiently. Lets the consolidation
/// pipeline and predictor run their heuristic (System 1 / statistical)
/// paths in tests and in deployments with no LLM configured, exercising
/// the same fallback path a real transient outage would hit.
#[derive(Debug, Default)]
pub struct UnavailableLlmProvider;

#[async_trait]
impl LlmProvider for UnavailableLlmProvider {
    async fn complete(&self, _request: CompletionRequest) -> TaskerResult<String> {
        Err(crate::error::TaskerError::transient(
            "llm_provider",
            "no LLM provider configured",
        ))
    }
}
