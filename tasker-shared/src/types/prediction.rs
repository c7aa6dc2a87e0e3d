//! PredictionResult / ConfidenceInterval: output of the Predictor (spec §3, §4.9).

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Triple (lower ≤ point ≤ upper) with nominal confidence level.
/// Invariant: non-negative for resources and durations (spec §3, §8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub point: f64,
    pub upper: f64,
    pub level: f64,
}

impl ConfidenceInterval {
    pub fn new(lower: f64, point: f64, upper: f64, level: f64) -> Self {
        debug_assert!(lower <= point && point <= upper);
        Self {
            lower: lower.max(0.0),
            point: point.max(0.0),
            upper: upper.max(0.0),
            level,
        }
    }

    /// `(upper - lower) / 2 / |point|`.
    pub fn relative_uncertainty(&self) -> f64 {
        if self.point.abs() < f64::EPSILON {
            0.0
        } else {
            (self.upper - self.lower) / 2.0 / self.point.abs()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lower <= self.point && self.point <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Discretized on success probability: ≥0.9 low, ≥0.75 medium, ≥0.5
    /// high, else critical (spec §4.9).
    pub fn from_success_probability(p: f64) -> Self {
        if p >= 0.9 {
            Self::Low
        } else if p >= 0.75 {
            Self::Medium
        } else if p >= 0.5 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottleneckSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleneckAlert {
    pub resource: String,
    pub severity: BottleneckSeverity,
    pub current_utilization: f64,
    pub predicted_time_to_saturation_minutes: Option<f64>,
    pub mitigation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalPattern {
    pub metric: String,
    pub kind: String,
    pub strength: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub id: Uuid,
    pub task_id: Uuid,
    pub duration: ConfidenceInterval,
    pub resource_forecasts: Vec<(String, ConfidenceInterval)>,
    pub bottleneck_alerts: Vec<BottleneckAlert>,
    pub temporal_patterns: Vec<TemporalPattern>,
    pub risk_level: RiskLevel,
    pub success_probability: f64,
    pub overall_confidence: f64,
    pub recommendations: Vec<String>,
    pub critical_constraints: Vec<String>,
}
