//! Step 8 - ConsolidationReport (spec §4.8), including the optional
//! token-economy and local-reasoning metrics supplemented from
//! `original_source` (SPEC_FULL.md §2).

use tasker_shared::types::SemanticPattern;

/// Pre/post compression and cache-hit counters, grounded in
/// `evaluation/token_tracking.py`. `None` unless a caller supplies token
/// estimates.
#[derive(Debug, Clone)]
pub struct TokenEconomy {
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub cache_hits: u64,
}

impl TokenEconomy {
    pub fn compression_ratio(&self) -> f64 {
        if self.tokens_before == 0 {
            1.0
        } else {
            self.tokens_after as f64 / self.tokens_before as f64
        }
    }
}

/// Grounded in `consolidation/local_reasoning.py`.
#[derive(Debug, Clone)]
pub struct LocalReasoningMetrics {
    pub latency_ms: f64,
    pub tokens_generated: u64,
    pub dual_process_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub events_processed: usize,
    pub clusters_formed: usize,
    pub patterns_extracted: Vec<SemanticPattern>,
    pub patterns_rejected: usize,
    pub quality_before: f64,
    pub quality_after: f64,
    pub token_economy: Option<TokenEconomy>,
    pub local_reasoning: Option<LocalReasoningMetrics>,
}

impl ConsolidationReport {
    pub fn empty() -> Self {
        Self {
            events_processed: 0,
            clusters_formed: 0,
            patterns_extracted: Vec::new(),
            patterns_rejected: 0,
            quality_before: 0.0,
            quality_after: 0.0,
            token_economy: None,
            local_reasoning: None,
        }
    }

    pub fn quality_delta(&self) -> f64 {
        self.quality_after - self.quality_before
    }
}

/// Weighted mean of usefulness, recency and tag diversity, monotonic in
/// the number of distinct tags surfaced (SPEC_FULL.md §3 item 2).
pub fn quality_score(patterns: &[SemanticPattern]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }

    let usefulness: f64 = patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64;
    let recency = 1.0;
    let distinct_tags: std::collections::HashSet<&str> =
        patterns.iter().flat_map(|p| p.tags.iter().map(String::as_str)).collect();
    let tag_diversity = (distinct_tags.len() as f64 / (patterns.len() as f64 * 2.0)).min(1.0);

    0.5 * usefulness + 0.2 * recency + 0.3 * tag_diversity
}
