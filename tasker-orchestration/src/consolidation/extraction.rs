//! Step 3 - dual-process pattern extraction, step 4 - validation and
//! grounding, step 5 - System 1 / System 2 conflict resolution
//! (spec §4.8).

use std::collections::HashMap;
use std::sync::Arc;

use tasker_shared::llm::{CompletionRequest, LlmProvider};
use tasker_shared::types::{EpisodicEvent, EventType, HallucinationRisk, Outcome, PatternType, SemanticPattern};
use tracing::{debug, warn};

use super::clustering::Cluster;

const SYSTEM1_CONFIDENCE_FLOOR: f64 = 0.7;
const SIMPLE_CLUSTER_MAX_SIZE: usize = 3;
const GROUNDING_REJECT_THRESHOLD: f64 = 0.3;

/// System 1: cheap, local heuristic detectors firing on known shapes
/// (TDD, error recovery, refactoring, architectural decision).
pub fn system1_detect(cluster: &Cluster) -> Vec<SemanticPattern> {
    let mut patterns = Vec::new();
    let events = &cluster.events;

    if cluster.quality.has_causal_chain {
        let mut pattern = SemanticPattern::new(
            "test-driven development workflow: failing test, fix, passing test",
            PatternType::Workflow,
            0.8,
        );
        pattern.tags = vec!["tdd".into(), "system1".into()];
        pattern.evidence = "test_run(failure) -> file_change -> test_run(success)".into();
        pattern.source_event_ids = events.iter().map(|e| e.id).collect();
        patterns.push(pattern);
    }

    if events.iter().any(|e| matches!(e.event_type, EventType::Error)) {
        let mut pattern = SemanticPattern::new("error recovery sequence", PatternType::Pattern, 0.65);
        pattern.tags = vec!["error_recovery".into(), "system1".into()];
        pattern.evidence = "error event followed by a corrective action".into();
        pattern.source_event_ids = events.iter().map(|e| e.id).collect();
        patterns.push(pattern);
    }

    let file_change_count = events.iter().filter(|e| matches!(e.event_type, EventType::FileChange)).count();
    if file_change_count >= 3 && !events.iter().any(|e| matches!(e.event_type, EventType::TestRun)) {
        let mut pattern = SemanticPattern::new("refactoring without a test gate", PatternType::Pattern, 0.6);
        pattern.tags = vec!["refactoring".into(), "system1".into()];
        pattern.evidence = format!("{file_change_count} file changes with no intervening test run");
        pattern.source_event_ids = events.iter().map(|e| e.id).collect();
        patterns.push(pattern);
    }

    if events.iter().any(|e| matches!(e.event_type, EventType::Decision)) {
        let mut pattern = SemanticPattern::new("architectural decision point", PatternType::Decision, 0.6);
        pattern.tags = vec!["architecture".into(), "system1".into()];
        pattern.evidence = "decision event recorded in cluster".into();
        pattern.source_event_ids = events.iter().map(|e| e.id).collect();
        patterns.push(pattern);
    }

    patterns
}

pub fn system1_confidence(patterns: &[SemanticPattern]) -> f64 {
    if patterns.is_empty() {
        0.0
    } else {
        patterns.iter().map(|p| p.confidence).sum::<f64>() / patterns.len() as f64
    }
}

/// Whether System 1 alone suffices: confidence ≥ 0.7 and the cluster
/// "looks simple" (small, spec §4.8 step 3).
pub fn system1_suffices(cluster: &Cluster, system1_patterns: &[SemanticPattern]) -> bool {
    system1_confidence(system1_patterns) >= SYSTEM1_CONFIDENCE_FLOOR && cluster.quality.size <= SIMPLE_CLUSTER_MAX_SIZE
}

/// System 2: format the cluster into a deterministic textual summary,
/// prompt the LLM for up to `max_patterns`, parse the structured reply.
/// A malformed or failed LLM call logs and yields no patterns rather than
/// aborting consolidation (spec §4.8 "failure semantics").
pub async fn system2_extract(
    llm: &Arc<dyn LlmProvider>,
    cluster: &Cluster,
    max_patterns: usize,
    uncertain_questions: &[String],
) -> Vec<SemanticPattern> {
    let summary = cluster_summary(cluster);
    let questions = uncertain_questions.join("; ");
    let request = CompletionRequest {
        system_prompt: "Extract up to N generalized behavioral patterns from this event cluster. \
            Reply as a JSON array of {description, pattern_type, confidence, tags, evidence}."
            .to_string(),
        user_prompt: format!(
            "Cluster summary:\n{summary}\n\nOpen questions from heuristics: {questions}\n\nMax patterns: {max_patterns}"
        ),
        max_tokens: 800,
    };

    match llm.complete(request).await {
        Ok(reply) => parse_system2_reply(&reply, cluster),
        Err(err) => {
            warn!(error = %err, "system2 extraction failed, skipping cluster");
            Vec::new()
        }
    }
}

fn cluster_summary(cluster: &Cluster) -> String {
    cluster
        .events
        .iter()
        .map(|e| format!("[{}] {} -> {}", e.timestamp.to_rfc3339(), e.event_type, e.outcome))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(serde::Deserialize)]
struct RawPattern {
    description: String,
    #[serde(default)]
    pattern_type: Option<String>,
    confidence: f64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    evidence: String,
}

fn parse_system2_reply(reply: &str, cluster: &Cluster) -> Vec<SemanticPattern> {
    let raw: Vec<RawPattern> = match serde_json::from_str(reply) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "system2 reply did not parse as JSON, skipping");
            return Vec::new();
        }
    };

    raw.into_iter()
        .map(|r| {
            let pattern_type = match r.pattern_type.as_deref() {
                Some("decision") => PatternType::Decision,
                Some("fact") => PatternType::Fact,
                Some("workflow") => PatternType::Workflow,
                _ => PatternType::Pattern,
            };
            let mut pattern = SemanticPattern::new(r.description, pattern_type, r.confidence);
            pattern.tags = r.tags;
            pattern.tags.push("system2".into());
            pattern.evidence = r.evidence;
            pattern.source_event_ids = cluster.events.iter().map(|e| e.id).collect();
            pattern
        })
        .collect()
}

/// Optional stronger-LLM validation pass: re-rate or reject each pattern
/// (spec §4.8 step 3 "optional Claude validation").
pub async fn validate_with_llm(
    llm: &Arc<dyn LlmProvider>,
    events: &[EpisodicEvent],
    patterns: Vec<SemanticPattern>,
) -> Vec<SemanticPattern> {
    if patterns.is_empty() {
        return patterns;
    }
    let context = format!(
        "{} events, {} candidate patterns",
        events.len(),
        patterns.len()
    );
    let request = CompletionRequest {
        system_prompt: "Re-rate each pattern's confidence 0.0-1.0 given this context; reply as a JSON array of floats in the same order, or an empty array to reject all.".into(),
        user_prompt: context,
        max_tokens: 200,
    };

    match llm.complete(request).await {
        Ok(reply) => match serde_json::from_str::<Vec<f64>>(&reply) {
            Ok(ratings) if ratings.len() == patterns.len() => patterns
                .into_iter()
                .zip(ratings)
                .map(|(mut p, rating)| {
                    p.confidence = rating.clamp(0.0, 1.0);
                    p
                })
                .collect(),
            _ => patterns,
        },
        Err(_) => patterns,
    }
}

/// Step 4: grounding score = fraction of the pattern's evidence strings
/// (token-wise) that appear in the cluster's content. Low grounding
/// rejects the pattern outright (spec §4.8).
pub fn ground_and_validate(cluster: &Cluster, mut pattern: SemanticPattern) -> Option<SemanticPattern> {
    let haystack = cluster_summary(cluster).to_lowercase();
    let evidence_tokens: Vec<&str> = pattern.evidence.split_whitespace().collect();
    let grounding_score = if evidence_tokens.is_empty() {
        0.0
    } else {
        let matched = evidence_tokens.iter().filter(|t| haystack.contains(&t.to_lowercase())).count();
        matched as f64 / evidence_tokens.len() as f64
    };

    if grounding_score < GROUNDING_REJECT_THRESHOLD {
        return None;
    }

    pattern.validation.grounding_score = grounding_score;
    pattern.validation.hallucination_risk = if grounding_score >= 0.7 {
        HallucinationRisk::Low
    } else if grounding_score >= 0.4 {
        HallucinationRisk::Medium
    } else {
        HallucinationRisk::High
    };

    let multiplier = cluster_confidence_multiplier(cluster);
    pattern.confidence = (pattern.confidence * multiplier).clamp(0.0, 1.0);
    Some(pattern)
}

fn cluster_confidence_multiplier(cluster: &Cluster) -> f64 {
    let cohesion_component = cluster.quality.spatial_cohesion;
    let size_component = (cluster.quality.size as f64 / 5.0).min(1.0);
    (0.5 + 0.3 * cohesion_component + 0.2 * size_component).min(1.0)
}

/// Step 5: group patterns by normalized description and reconcile
/// System 1 vs System 2 candidates (spec §4.8).
pub fn resolve_system_conflicts(patterns: Vec<SemanticPattern>) -> Vec<SemanticPattern> {
    let mut groups: HashMap<String, Vec<SemanticPattern>> = HashMap::new();
    for pattern in patterns {
        groups.entry(pattern.normalized_description()).or_default().push(pattern);
    }

    let mut resolved = Vec::new();
    for (_, mut group) in groups {
        if group.len() == 1 {
            resolved.push(group.pop().unwrap());
            continue;
        }

        let s1 = group.iter().position(|p| p.tags.iter().any(|t| t == "system1"));
        let s2 = group.iter().position(|p| p.tags.iter().any(|t| t == "system2"));

        match (s1, s2) {
            (Some(i1), Some(i2)) => {
                let p1 = group[i1].clone();
                let p2 = group[i2].clone();
                resolved.push(reconcile_pair(p1, p2));
            }
            _ => resolved.extend(group),
        }
    }
    resolved
}

fn reconcile_pair(p1: SemanticPattern, p2: SemanticPattern) -> SemanticPattern {
    let conf_delta = (p1.confidence - p2.confidence).abs();
    if conf_delta > 0.2 {
        if p1.confidence >= p2.confidence { p1 } else { p2 }
    } else if tag_jaccard(&p1.tags, &p2.tags) > 0.7 {
        merge_patterns(p1, p2)
    } else if tag_jaccard(&p1.tags, &p2.tags) < 0.3 {
        let mut deferred = p2;
        deferred.confidence = 0.5;
        deferred.tags.push("defer".into());
        deferred
    } else {
        p2
    }
}

fn merge_patterns(mut p1: SemanticPattern, p2: SemanticPattern) -> SemanticPattern {
    for tag in p2.tags {
        if !p1.tags.contains(&tag) {
            p1.tags.push(tag);
        }
    }
    p1.confidence = (p1.confidence + p2.confidence) / 2.0;
    p1.evidence = format!("{}; {}", p1.evidence, p2.evidence);
    p1
}

fn tag_jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: std::collections::HashSet<&String> = a.iter().collect();
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_cluster() -> Cluster {
        let e1 = EpisodicEvent::new("s1", EventType::TestRun, Outcome::Failure, json!({}));
        let e2 = EpisodicEvent::new("s1", EventType::FileChange, Outcome::Success, json!({}));
        let e3 = EpisodicEvent::new("s1", EventType::TestRun, Outcome::Success, json!({}));
        super::super::clustering::context_clustering(&[e1, e2, e3], chrono::Duration::minutes(60))
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn system1_detects_tdd_pattern() {
        let cluster = make_cluster();
        let patterns = system1_detect(&cluster);
        assert!(patterns.iter().any(|p| p.tags.contains(&"tdd".to_string())));
        assert!(system1_suffices(&cluster, &patterns));
    }

    #[test]
    fn low_grounding_pattern_is_rejected() {
        let cluster = make_cluster();
        let mut pattern = SemanticPattern::new("unrelated claim", PatternType::Pattern, 0.9);
        pattern.evidence = "zzz_nonexistent_token qqq_another".into();
        assert!(ground_and_validate(&cluster, pattern).is_none());
    }

    #[test]
    fn large_confidence_gap_keeps_higher_confidence_pattern() {
        let mut p1 = SemanticPattern::new("shared pattern", PatternType::Pattern, 0.9);
        p1.tags.push("system1".into());
        let mut p2 = SemanticPattern::new("shared pattern", PatternType::Pattern, 0.4);
        p2.tags.push("system2".into());

        let resolved = resolve_system_conflicts(vec![p1.clone(), p2]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].confidence, 0.9);
    }
}
