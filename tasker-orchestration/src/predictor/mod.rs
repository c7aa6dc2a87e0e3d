//! Predictor (spec §4.9): composes the Temporal Reasoner, Bottleneck
//! Detector, and time-series ensemble into a single `PredictionResult` per
//! task.
//!
//! Nothing here persists observations durably - callers (typically the
//! orchestrator's progress loop) feed `record_resource_utilization` and
//! `record_task_duration` as work executes, and `predict` reads whatever
//! history has accumulated so far.

pub mod bottleneck;
pub mod temporal;
pub mod timeseries;

use std::collections::HashMap;
use std::sync::Mutex;

use tasker_shared::types::{
    BottleneckSeverity, ConfidenceInterval, PredictionResult, RiskLevel, Task,
};
use uuid::Uuid;

pub use bottleneck::{BottleneckDetector, ResourceForecast, ResourceType};
pub use temporal::TemporalReasoner;

/// Fixed defaults used whenever a task category has under 5 historical
/// duration samples - not enough signal to fit the ensemble (spec §4.9).
const DEFAULT_DURATION_CI: (f64, f64, f64) = (200.0, 300.0, 400.0);
const DEFAULT_PATTERN_MATCH_SCORE: f64 = 0.3;
const MIN_HISTORY_FOR_ENSEMBLE: usize = 5;

pub struct Predictor {
    temporal: TemporalReasoner,
    bottleneck: BottleneckDetector,
    duration_history: Mutex<HashMap<String, Vec<f64>>>,
}

impl Predictor {
    pub fn new(saturation_threshold: f64, critical_threshold: f64, alert_horizon: chrono::Duration) -> Self {
        Self {
            temporal: TemporalReasoner::new(),
            bottleneck: BottleneckDetector::new(saturation_threshold, critical_threshold, alert_horizon),
            duration_history: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &tasker_shared::config::Config) -> Self {
        Self::new(
            config.saturation_threshold,
            config.critical_threshold,
            chrono::Duration::hours(config.alert_horizon_hours as i64),
        )
    }

    pub fn record_resource_utilization(&self, resource: ResourceType, value: f64) {
        self.bottleneck.observe(resource, value);
        self.temporal.observe(resource.to_string().as_str(), value);
    }

    pub fn record_task_duration(&self, task: &Task, seconds: f64) {
        let key = duration_category(task);
        let mut history = self.duration_history.lock().unwrap();
        history.entry(key).or_default().push(seconds);
    }

    /// Composes every sub-model into a full `PredictionResult` for `task`
    /// (spec §4.9).
    pub fn predict(&self, task: &Task) -> PredictionResult {
        let resource_forecasts = self.bottleneck.forecast_all();
        let bottleneck_alerts = self.bottleneck.detect();
        let temporal_patterns = self.temporal.analyze_all();
        let (duration, duration_confidence) = self.predict_duration(task);

        let mut success_probability = 0.85;
        for forecast in &resource_forecasts {
            if forecast.is_constrained {
                success_probability *= 0.9;
            }
        }
        let critical_count = bottleneck_alerts.iter().filter(|b| b.severity == BottleneckSeverity::Critical).count();
        success_probability *= 0.95_f64.powi(critical_count as i32);

        let risk_level = RiskLevel::from_success_probability(success_probability);
        let base_confidence = if self.temporal.has_history() { 0.7 } else { 0.5 };
        let overall_confidence = (base_confidence + duration_confidence) / 2.0;

        let mut critical_constraints: Vec<String> = resource_forecasts
            .iter()
            .filter(|f| f.is_constrained)
            .map(|f| f.resource.to_string())
            .collect();
        critical_constraints.extend(
            bottleneck_alerts
                .iter()
                .filter(|b| b.severity == BottleneckSeverity::Critical)
                .map(|b| b.resource.clone()),
        );
        critical_constraints.sort();
        critical_constraints.dedup();

        let mut recommendations: Vec<String> =
            bottleneck_alerts.iter().filter_map(|b| b.mitigation.first().cloned()).collect();
        if recommendations.is_empty() && risk_level == RiskLevel::Low {
            recommendations.push("no constraining resources detected, proceed as planned".to_string());
        }

        PredictionResult {
            id: Uuid::now_v7(),
            task_id: task.id,
            duration,
            resource_forecasts: resource_forecasts
                .into_iter()
                .map(|f| (f.resource.to_string(), forecast_to_ci(&f)))
                .collect(),
            bottleneck_alerts,
            temporal_patterns,
            risk_level,
            success_probability,
            overall_confidence,
            recommendations,
            critical_constraints,
        }
    }

    /// Ensemble forecast one step ahead when at least 5 historical
    /// durations exist for this task's category, else the fixed default
    /// (spec §4.9). Returns the duration CI alongside a confidence weight
    /// for that estimate - 0.9 when ensemble-backed, the upstream's fixed
    /// 0.3 "pattern match score" otherwise.
    fn predict_duration(&self, task: &Task) -> (ConfidenceInterval, f64) {
        let key = duration_category(task);
        let history = self.duration_history.lock().unwrap();
        let samples = history.get(&key).cloned().unwrap_or_default();
        drop(history);

        if samples.len() >= MIN_HISTORY_FOR_ENSEMBLE {
            if let Some(forecast) = timeseries::ensemble_forecast(&samples, 1) {
                let point = forecast.predictions[0];
                let width = forecast.confidence_widths[0];
                return (ConfidenceInterval::new(point - width, point, point + width, 0.95), 0.9);
            }
        }

        let (lower, point, upper) = DEFAULT_DURATION_CI;
        (ConfidenceInterval::new(lower, point, upper, 0.6), DEFAULT_PATTERN_MATCH_SCORE)
    }
}

fn forecast_to_ci(forecast: &ResourceForecast) -> ConfidenceInterval {
    let peak = forecast.projected.iter().cloned().fold(forecast.current_utilization, f64::max);
    let low = forecast.projected.iter().cloned().fold(forecast.current_utilization, f64::min);
    ConfidenceInterval::new(low, forecast.current_utilization, peak, 0.8)
}

/// Groups duration history by the same keyword routing the planner uses
/// for agent-type assignment, so "documentation"-shaped tasks and
/// "debugging"-shaped tasks keep separate duration profiles.
fn duration_category(task: &Task) -> String {
    crate::planner::required_agent_type_hint(&format!("{} {}", task.title, task.description)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor() -> Predictor {
        Predictor::new(0.85, 0.95, chrono::Duration::hours(4))
    }

    #[test]
    fn default_duration_used_under_five_samples() {
        let predictor = predictor();
        let task = Task::new("Write docs", "document the API");
        let result = predictor.predict(&task);
        assert_eq!(result.duration.point, 300.0);
        assert_eq!(result.overall_confidence, (0.5 + 0.3) / 2.0);
    }

    #[test]
    fn constrained_resource_lowers_success_probability() {
        let predictor = predictor();
        for i in 0..10 {
            predictor.record_resource_utilization(ResourceType::Cpu, 0.5 + i as f64 * 0.05);
        }
        let task = Task::new("Deploy service", "roll out to production");
        let result = predictor.predict(&task);
        assert!(result.success_probability < 0.85);
    }

    #[test]
    fn enough_duration_history_uses_ensemble() {
        let predictor = predictor();
        let task = Task::new("Review PR", "review the change");
        for seconds in [100.0, 120.0, 110.0, 130.0, 125.0, 128.0] {
            predictor.record_task_duration(&task, seconds);
        }
        let result = predictor.predict(&task);
        assert_ne!(result.duration.point, 300.0);
    }
}
