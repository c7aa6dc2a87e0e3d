//! Step 2 - clustering (spec §4.8): context clustering and surprise
//! clustering, plus the cluster-quality metrics computed for
//! observability.

use std::collections::HashMap;

use tasker_shared::types::{EpisodicEvent, EventType, Outcome};

#[derive(Debug, Clone)]
pub struct ClusterQuality {
    pub size: usize,
    pub temporal_span_minutes: f64,
    pub spatial_cohesion: f64,
    pub has_causal_chain: bool,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub events: Vec<EpisodicEvent>,
    pub quality: ClusterQuality,
}

/// Context clustering: primary key session, sub-clustered by spatial
/// similarity (cwd depth 0.5, file-set Jaccard 0.3, shared task/phase 0.2),
/// then merged across sessions/sub-clusters when temporally adjacent
/// (gap ≤ `max_time_gap`) - spec §4.8 step 2.
pub fn context_clustering(events: &[EpisodicEvent], max_time_gap: chrono::Duration) -> Vec<Cluster> {
    let mut by_session: HashMap<&str, Vec<&EpisodicEvent>> = HashMap::new();
    for event in events {
        by_session.entry(event.session.as_str()).or_default().push(event);
    }

    let mut sub_clusters: Vec<Vec<EpisodicEvent>> = Vec::new();
    for (_, mut session_events) in by_session {
        session_events.sort_by_key(|e| e.timestamp);
        let mut current: Vec<EpisodicEvent> = Vec::new();
        for event in session_events {
            if let Some(last) = current.last() {
                if spatial_similarity(last, event) < 0.3 {
                    sub_clusters.push(std::mem::take(&mut current));
                }
            }
            current.push(event.clone());
        }
        if !current.is_empty() {
            sub_clusters.push(current);
        }
    }

    merge_temporally_adjacent(sub_clusters, max_time_gap)
}

/// Surprise clustering: events with `surprise_score >= threshold` become
/// cluster centers; every other event joins the temporally nearest center.
/// Falls back to context clustering when no event carries a surprise
/// signal (spec §4.8 step 2).
pub fn surprise_clustering(
    events: &[EpisodicEvent],
    threshold: f64,
    max_time_gap: chrono::Duration,
) -> Vec<Cluster> {
    if events.iter().all(|e| e.surprise_score.is_none()) {
        return context_clustering(events, max_time_gap);
    }

    let mut sorted: Vec<&EpisodicEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    let centers: Vec<usize> = sorted
        .iter()
        .enumerate()
        .filter(|(_, e)| e.surprise_score.unwrap_or(0.0) >= threshold)
        .map(|(i, _)| i)
        .collect();

    if centers.is_empty() {
        return context_clustering(events, max_time_gap);
    }

    let mut buckets: Vec<Vec<EpisodicEvent>> = vec![Vec::new(); centers.len()];
    for (i, event) in sorted.iter().enumerate() {
        let nearest = centers
            .iter()
            .enumerate()
            .min_by_key(|(_, &center_idx)| (center_idx as i64 - i as i64).abs())
            .map(|(bucket_idx, _)| bucket_idx)
            .unwrap_or(0);
        buckets[nearest].push((*event).clone());
    }

    buckets.into_iter().filter(|b| !b.is_empty()).map(build_cluster).collect()
}

fn merge_temporally_adjacent(mut clusters: Vec<Vec<EpisodicEvent>>, max_gap: chrono::Duration) -> Vec<Cluster> {
    for cluster in &mut clusters {
        cluster.sort_by_key(|e| e.timestamp);
    }
    clusters.sort_by_key(|c| c.first().map(|e| e.timestamp));

    let mut merged: Vec<Vec<EpisodicEvent>> = Vec::new();
    for cluster in clusters {
        if let (Some(last_group), Some(first_new)) = (merged.last_mut(), cluster.first()) {
            if let Some(last_event) = last_group.last() {
                if first_new.timestamp - last_event.timestamp <= max_gap {
                    last_group.extend(cluster);
                    continue;
                }
            }
        }
        merged.push(cluster);
    }

    merged.into_iter().map(build_cluster).collect()
}

fn build_cluster(events: Vec<EpisodicEvent>) -> Cluster {
    let quality = quality_of(&events);
    Cluster { events, quality }
}

fn quality_of(events: &[EpisodicEvent]) -> ClusterQuality {
    let size = events.len();
    let temporal_span_minutes = match (events.iter().map(|e| e.timestamp).min(), events.iter().map(|e| e.timestamp).max()) {
        (Some(min), Some(max)) => (max - min).num_seconds() as f64 / 60.0,
        _ => 0.0,
    };
    let spatial_cohesion = mean_pairwise_similarity(events);
    let has_causal_chain = detect_causal_chain(events);

    ClusterQuality { size, temporal_span_minutes, spatial_cohesion, has_causal_chain }
}

fn mean_pairwise_similarity(events: &[EpisodicEvent]) -> f64 {
    if events.len() < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut pairs = 0;
    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            total += spatial_similarity(&events[i], &events[j]);
            pairs += 1;
        }
    }
    if pairs == 0 { 1.0 } else { total / pairs as f64 }
}

/// Weighted blend: shared working-directory depth (0.5), file-set Jaccard
/// (0.3), shared task/phase (0.2), normalized by the active weights (spec
/// §4.8 step 2).
fn spatial_similarity(a: &EpisodicEvent, b: &EpisodicEvent) -> f64 {
    let mut weighted_sum = 0.0;
    let mut active_weight = 0.0;

    if let (Some(cwd_a), Some(cwd_b)) = (&a.context.cwd, &b.context.cwd) {
        let shared_depth = common_path_depth(cwd_a, cwd_b);
        let max_depth = cwd_a.split('/').count().max(cwd_b.split('/').count()).max(1);
        weighted_sum += 0.5 * (shared_depth as f64 / max_depth as f64);
        active_weight += 0.5;
    }

    if !a.context.files.is_empty() || !b.context.files.is_empty() {
        weighted_sum += 0.3 * jaccard(&a.context.files, &b.context.files);
        active_weight += 0.3;
    }

    if let (Some(phase_a), Some(phase_b)) = (&a.context.phase, &b.context.phase) {
        weighted_sum += 0.2 * if phase_a == phase_b { 1.0 } else { 0.0 };
        active_weight += 0.2;
    }

    if active_weight == 0.0 {
        0.5
    } else {
        weighted_sum / active_weight
    }
}

fn common_path_depth(a: &str, b: &str) -> usize {
    a.split('/').zip(b.split('/')).take_while(|(x, y)| x == y).count()
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: std::collections::HashSet<&String> = a.iter().collect();
    let set_b: std::collections::HashSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

/// Hard-coded event-type adjacency patterns (SPEC_FULL.md §3 item 3):
/// error→fix→success, test_run(failure)→file_change→test_run(success).
fn detect_causal_chain(events: &[EpisodicEvent]) -> bool {
    let mut sorted: Vec<&EpisodicEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);

    sorted.windows(3).any(|w| {
        let tdd = matches!(w[0].event_type, EventType::TestRun)
            && w[0].outcome == Outcome::Failure
            && matches!(w[1].event_type, EventType::FileChange)
            && matches!(w[2].event_type, EventType::TestRun)
            && w[2].outcome == Outcome::Success;
        let error_fix = matches!(w[0].event_type, EventType::Error)
            && matches!(w[1].event_type, EventType::Action | EventType::FileChange)
            && w[2].outcome == Outcome::Success;
        tdd || error_fix
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(session: &str, event_type: EventType, outcome: Outcome) -> EpisodicEvent {
        EpisodicEvent::new(session, event_type, outcome, json!({}))
    }

    #[test]
    fn tdd_trio_forms_single_cluster_with_causal_chain() {
        let mut e1 = event("s1", EventType::TestRun, Outcome::Failure);
        let mut e2 = event("s1", EventType::FileChange, Outcome::Success);
        let mut e3 = event("s1", EventType::TestRun, Outcome::Success);
        e1.context.cwd = Some("/repo/src".into());
        e2.context.cwd = Some("/repo/src".into());
        e3.context.cwd = Some("/repo/src".into());
        e2.timestamp = e1.timestamp + chrono::Duration::minutes(1);
        e3.timestamp = e1.timestamp + chrono::Duration::minutes(2);

        let clusters = context_clustering(&[e1, e2, e3], chrono::Duration::minutes(60));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].events.len(), 3);
        assert!(clusters[0].quality.has_causal_chain);
    }

    #[test]
    fn surprise_clustering_falls_back_without_signal() {
        let e1 = event("s1", EventType::Action, Outcome::Success);
        let e2 = event("s1", EventType::Action, Outcome::Success);
        let clusters = surprise_clustering(&[e1, e2], 3.5, chrono::Duration::minutes(60));
        assert_eq!(clusters.len(), 1);
    }
}
