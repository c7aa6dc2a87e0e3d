//! Consolidation Pipeline (spec §4.8) - the hardest subsystem. Periodically
//! transforms a window of raw episodic events into validated semantic
//! patterns under explicit hallucination control. Runs as a scheduled task
//! (default every 24h, spec §6 `consolidation_window_hours`) and can be
//! invoked on demand via `run`.
//!
//! Failure semantics: a per-cluster extraction failure is logged and
//! skipped, never aborts the run; persistence failure for a single pattern
//! is logged and skipped (spec §4.8).

pub mod clustering;
pub mod extraction;
pub mod report;
pub mod store;

use std::sync::Arc;

use tasker_shared::llm::LlmProvider;
use tasker_shared::TaskerResult;
use tracing::{info, warn};

pub use report::{ConsolidationReport, LocalReasoningMetrics, TokenEconomy};
pub use store::{EpisodicEventStore, InMemoryEpisodicEventStore, InMemoryKnowledgeGraphStore, InMemoryPatternStore, KnowledgeGraphStore, PatternStore};

#[derive(Debug, Clone, Copy)]
pub enum ClusteringStrategy {
    Context,
    Surprise,
}

pub struct ConsolidationConfig {
    pub window: chrono::Duration,
    pub max_time_gap: chrono::Duration,
    pub surprise_threshold: f64,
    pub min_confidence: f64,
    pub strategy: ClusteringStrategy,
    pub max_system2_patterns: usize,
}

impl ConsolidationConfig {
    pub fn from_config(cfg: &tasker_shared::config::Config) -> Self {
        Self {
            window: chrono::Duration::hours(cfg.consolidation_window_hours as i64),
            max_time_gap: chrono::Duration::minutes(cfg.max_time_gap_minutes as i64),
            surprise_threshold: cfg.surprise_threshold,
            min_confidence: cfg.consolidation_min_confidence,
            strategy: ClusteringStrategy::Context,
            max_system2_patterns: 5,
        }
    }
}

pub struct ConsolidationPipeline {
    events: Arc<dyn EpisodicEventStore>,
    patterns: Arc<dyn PatternStore>,
    knowledge_graph: Option<Arc<dyn KnowledgeGraphStore>>,
    llm: Arc<dyn LlmProvider>,
    validator_llm: Option<Arc<dyn LlmProvider>>,
}

impl ConsolidationPipeline {
    pub fn new(
        events: Arc<dyn EpisodicEventStore>,
        patterns: Arc<dyn PatternStore>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self { events, patterns, knowledge_graph: None, llm, validator_llm: None }
    }

    pub fn with_knowledge_graph(mut self, kg: Arc<dyn KnowledgeGraphStore>) -> Self {
        self.knowledge_graph = Some(kg);
        self
    }

    pub fn with_validator(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.validator_llm = Some(llm);
        self
    }

    pub async fn run(&self, config: &ConsolidationConfig) -> TaskerResult<ConsolidationReport> {
        // Step 1: acquisition.
        let events = self.events.unconsolidated_in_window(config.window).await?;
        if events.is_empty() {
            return Ok(ConsolidationReport::empty());
        }
        let quality_before = report::quality_score(&self.patterns.all().await?);

        // Step 2: clustering.
        let clusters = match config.strategy {
            ClusteringStrategy::Context => clustering::context_clustering(&events, config.max_time_gap),
            ClusteringStrategy::Surprise => {
                clustering::surprise_clustering(&events, config.surprise_threshold, config.max_time_gap)
            }
        };

        let mut accepted = Vec::new();
        let mut rejected = 0usize;

        for cluster in &clusters {
            if cluster.events.len() < 2 {
                continue;
            }

            let candidates = match self.extract_cluster(cluster, config).await {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(error = %err, cluster_size = cluster.events.len(), "cluster extraction failed, skipping");
                    continue;
                }
            };

            // Step 4: grounding.
            let mut grounded = Vec::new();
            for candidate in candidates {
                match extraction::ground_and_validate(cluster, candidate) {
                    Some(pattern) => grounded.push(pattern),
                    None => rejected += 1,
                }
            }

            // Step 5: reconcile System 1 vs System 2.
            let reconciled = extraction::resolve_system_conflicts(grounded);
            let passing: Vec<_> = reconciled.into_iter().filter(|p| p.confidence >= config.min_confidence).collect();
            accepted.extend(passing);
        }

        // Step 6: persistence.
        let mut persisted = Vec::new();
        for pattern in accepted {
            match self.patterns.save(pattern.clone()).await {
                Ok(()) => persisted.push(pattern),
                Err(err) => warn!(error = %err, pattern_id = %pattern.id, "pattern persistence failed, skipping"),
            }
        }

        let event_ids: Vec<uuid::Uuid> = events.iter().map(|e| e.id).collect();
        self.events.mark_consolidated(&event_ids).await?;

        // Step 7: temporal-graph synthesis (optional).
        if let Some(kg) = &self.knowledge_graph {
            let updates = synthesize_entity_updates(&events);
            if !updates.is_empty() {
                kg.push_updates(updates).await?;
            }
        }

        let quality_after = report::quality_score(&persisted);
        info!(
            events = events.len(),
            clusters = clusters.len(),
            patterns = persisted.len(),
            rejected,
            "consolidation run complete"
        );

        Ok(ConsolidationReport {
            events_processed: events.len(),
            clusters_formed: clusters.len(),
            patterns_extracted: persisted,
            patterns_rejected: rejected,
            quality_before,
            quality_after,
            token_economy: None,
            local_reasoning: None,
        })
    }

    async fn extract_cluster(
        &self,
        cluster: &clustering::Cluster,
        config: &ConsolidationConfig,
    ) -> TaskerResult<Vec<tasker_shared::types::SemanticPattern>> {
        let system1 = extraction::system1_detect(cluster);

        if extraction::system1_suffices(cluster, &system1) {
            return Ok(system1);
        }

        let system2 = extraction::system2_extract(&self.llm, cluster, config.max_system2_patterns, &[]).await;

        let mut combined = system1;
        combined.extend(if let Some(validator) = &self.validator_llm {
            extraction::validate_with_llm(validator, &cluster.events, system2).await
        } else {
            system2
        });

        Ok(combined)
    }
}

/// Step 7 helper: derive coarse entity/relation updates from the event
/// stream. Kept simple - frequency of (event_type -> outcome) edges above
/// a minimum threshold.
fn synthesize_entity_updates(events: &[tasker_shared::types::EpisodicEvent]) -> Vec<store::EntityUpdate> {
    use std::collections::HashMap;
    const MIN_FREQUENCY: u32 = 2;

    let mut counts: HashMap<(String, String), u32> = HashMap::new();
    for event in events {
        let key = (event.event_type.to_string(), event.outcome.to_string());
        *counts.entry(key).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, freq)| *freq >= MIN_FREQUENCY)
        .map(|((entity, relation), frequency)| store::EntityUpdate {
            entity,
            relation,
            target: "observed_outcome".to_string(),
            frequency,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tasker_shared::llm::{CompletionRequest, LlmProvider};
    use tasker_shared::types::{EpisodicEvent, EventType, Outcome};
    use tasker_shared::TaskerResult as Result;

    struct StubLlm;

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String> {
            Ok("[]".to_string())
        }
    }

    #[tokio::test]
    async fn empty_event_window_yields_empty_report() {
        let pipeline = ConsolidationPipeline::new(
            Arc::new(InMemoryEpisodicEventStore::default()),
            Arc::new(InMemoryPatternStore::default()),
            Arc::new(StubLlm),
        );
        let config = ConsolidationConfig {
            window: chrono::Duration::hours(24),
            max_time_gap: chrono::Duration::minutes(60),
            surprise_threshold: 3.5,
            min_confidence: 0.7,
            strategy: ClusteringStrategy::Context,
            max_system2_patterns: 5,
        };
        let report = pipeline.run(&config).await.unwrap();
        assert_eq!(report.events_processed, 0);
        assert_eq!(report.quality_delta(), 0.0);
    }

    #[tokio::test]
    async fn tdd_trio_consolidates_with_high_confidence_pattern() {
        let event_store = Arc::new(InMemoryEpisodicEventStore::default());
        let mut e1 = EpisodicEvent::new("s1", EventType::TestRun, Outcome::Failure, json!({}));
        let mut e2 = EpisodicEvent::new("s1", EventType::FileChange, Outcome::Success, json!({}));
        let mut e3 = EpisodicEvent::new("s1", EventType::TestRun, Outcome::Success, json!({}));
        e1.context.cwd = Some("/repo/src".into());
        e2.context.cwd = Some("/repo/src".into());
        e3.context.cwd = Some("/repo/src".into());
        e2.timestamp = e1.timestamp + chrono::Duration::minutes(1);
        e3.timestamp = e1.timestamp + chrono::Duration::minutes(2);
        event_store.record(e1).await.unwrap();
        event_store.record(e2).await.unwrap();
        event_store.record(e3).await.unwrap();

        let pipeline =
            ConsolidationPipeline::new(event_store.clone(), Arc::new(InMemoryPatternStore::default()), Arc::new(StubLlm));
        let config = ConsolidationConfig {
            window: chrono::Duration::hours(24),
            max_time_gap: chrono::Duration::minutes(60),
            surprise_threshold: 3.5,
            min_confidence: 0.7,
            strategy: ClusteringStrategy::Context,
            max_system2_patterns: 5,
        };

        let report = pipeline.run(&config).await.unwrap();
        assert_eq!(report.events_processed, 3);
        assert!(report.patterns_extracted.iter().any(|p| p.tags.contains(&"tdd".to_string())));
        assert!(report.patterns_extracted.iter().all(|p| p.confidence >= config.min_confidence));

        let remaining = event_store.unconsolidated_in_window(chrono::Duration::hours(24)).await.unwrap();
        assert!(remaining.is_empty());
    }
}
