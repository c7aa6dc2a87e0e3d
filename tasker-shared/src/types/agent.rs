//! Agent: an addressable worker (spec §3 "Agent").

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of specialist agent roles. Concrete per-type behavior is a
/// plug-in (spec §1); the kernel only ever switches on this tag to decide
/// routing, never on domain logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Planner,
    Executor,
    Monitor,
    Predictor,
    Learner,
    Research,
    Analysis,
    Synthesis,
    Validation,
    Optimization,
    Documentation,
    Review,
    Debugging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Failed,
    Offline,
    Shutdown,
}

const CONFIDENCE_RING_CAPACITY: usize = 100;

/// Rolling performance metrics updated by the worker loop itself (spec
/// §4.4 step 6) and read by the health monitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub decisions_made: u64,
    pub successes: u64,
    pub errors: u64,
    /// Rolling mean decision latency in milliseconds.
    pub average_decision_latency_ms: f64,
    /// Bounded ring of the last `CONFIDENCE_RING_CAPACITY` confidence
    /// values reported by completed tasks.
    confidence_ring: VecDeque<f64>,
}

impl AgentMetrics {
    pub fn error_rate(&self) -> f64 {
        if self.decisions_made == 0 {
            0.0
        } else {
            self.errors as f64 / self.decisions_made as f64
        }
    }

    pub fn average_confidence(&self) -> f64 {
        if self.confidence_ring.is_empty() {
            1.0
        } else {
            self.confidence_ring.iter().sum::<f64>() / self.confidence_ring.len() as f64
        }
    }

    pub fn record_decision(&mut self, latency_ms: f64, succeeded: bool, confidence: f64) {
        self.decisions_made += 1;
        if succeeded {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
        let n = self.decisions_made as f64;
        self.average_decision_latency_ms += (latency_ms - self.average_decision_latency_ms) / n;

        if self.confidence_ring.len() == CONFIDENCE_RING_CAPACITY {
            self.confidence_ring.pop_front();
        }
        self.confidence_ring.push_back(confidence);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub agent_type: AgentType,
    pub capabilities: HashSet<String>,
    pub status: AgentStatus,
    pub current_task: Option<Uuid>,
    pub last_heartbeat: DateTime<Utc>,
    pub restart_count: u32,
    pub metrics: AgentMetrics,
}

impl Agent {
    pub fn new(agent_type: AgentType, capabilities: HashSet<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            agent_type,
            capabilities,
            status: AgentStatus::Idle,
            current_task: None,
            last_heartbeat: Utc::now(),
            restart_count: 0,
            metrics: AgentMetrics::default(),
        }
    }

    /// A worker is healthy iff running ∧ error_rate ≤ 0.2 ∧
    /// average_confidence ≥ 0.5 (spec §4.4).
    pub fn is_healthy(&self) -> bool {
        !matches!(self.status, AgentStatus::Offline | AgentStatus::Shutdown)
            && self.metrics.error_rate() <= 0.2
            && self.metrics.average_confidence() >= 0.5
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }

    pub fn is_stale(&self, threshold: chrono::Duration) -> bool {
        self.status != AgentStatus::Offline && Utc::now() - self.last_heartbeat > threshold
    }
}
