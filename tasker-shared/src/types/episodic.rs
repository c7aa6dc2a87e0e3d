//! EpisodicEvent: an observed fact feeding the consolidation pipeline
//! (spec §3, §4.8).

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Action,
    Decision,
    Error,
    FileChange,
    TestRun,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
    Ongoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationStatus {
    Unconsolidated,
    Consolidated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventContext {
    pub cwd: Option<String>,
    pub files: Vec<String>,
    pub task: Option<Uuid>,
    pub phase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicEvent {
    pub id: Uuid,
    pub session: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub content: Value,
    pub outcome: Outcome,
    /// Higher means more unexpected; drives surprise-based clustering.
    pub surprise_score: Option<f64>,
    pub context: EventContext,
    pub consolidation_status: ConsolidationStatus,
}

impl EpisodicEvent {
    pub fn new(session: impl Into<String>, event_type: EventType, outcome: Outcome, content: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            session: session.into(),
            timestamp: Utc::now(),
            event_type,
            content,
            outcome,
            surprise_score: None,
            context: EventContext::default(),
            consolidation_status: ConsolidationStatus::Unconsolidated,
        }
    }

    pub fn mark_consolidated(&mut self) {
        self.consolidation_status = ConsolidationStatus::Consolidated;
    }
}
