//! Bottleneck Detector: per-resource rolling utilization windows, fixed
//! saturation/critical thresholds, and a static mitigation catalog (spec
//! §4.9).

use std::collections::HashMap;
use std::sync::Mutex;

use tasker_shared::types::{BottleneckAlert, BottleneckSeverity};

const MAX_SAMPLES_PER_RESOURCE: usize = 500;
const FORECAST_STEPS_AHEAD: usize = 10;

/// Fraction of `alert_horizon` within which a predicted saturation
/// crossing escalates a trending-but-still-under-threshold resource
/// straight to `High` rather than `Medium` (spec §4.9 "critical/high/
/// medium ... if predicted saturation occurs inside the alert horizon").
const NEAR_TERM_HORIZON_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Cpu,
    Memory,
    Io,
    Network,
    Disk,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] =
        [ResourceType::Cpu, ResourceType::Memory, ResourceType::Io, ResourceType::Network, ResourceType::Disk];

    fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Cpu => "cpu",
            ResourceType::Memory => "memory",
            ResourceType::Io => "io",
            ResourceType::Network => "network",
            ResourceType::Disk => "disk",
        }
    }

    /// Five-strategy mitigation catalog per resource kind, fixed and
    /// independent of the current reading (spec §4.9).
    fn mitigations(&self) -> [&'static str; 5] {
        match self {
            ResourceType::Cpu => [
                "Scale horizontally by adding more worker instances",
                "Offload compute-intensive tasks to background queues",
                "Enable request throttling on CPU-bound endpoints",
                "Profile hot paths and optimize algorithmic complexity",
                "Consider caching computed results to avoid recomputation",
            ],
            ResourceType::Memory => [
                "Increase heap/process memory limits",
                "Enable streaming processing to avoid buffering full payloads",
                "Add eviction policies to in-memory caches",
                "Audit for memory leaks in long-running agents",
                "Shard large in-memory datasets across instances",
            ],
            ResourceType::Io => [
                "Batch small I/O operations into larger ones",
                "Move to asynchronous, non-blocking I/O where possible",
                "Add a write-behind cache in front of the I/O backend",
                "Increase I/O queue depth and parallelism",
                "Profile and eliminate redundant reads/writes",
            ],
            ResourceType::Network => [
                "Enable compression on large payloads",
                "Add a CDN or edge cache for frequently requested data",
                "Reduce chattiness by batching requests",
                "Increase connection pool size and keep-alive timeouts",
                "Shard traffic across multiple network paths",
            ],
            ResourceType::Disk => [
                "Enable log rotation and aggressive retention policies",
                "Move cold data to cheaper, slower storage tiers",
                "Add disk capacity or migrate to faster storage",
                "Compress archived data at rest",
                "Audit for runaway temp-file accumulation",
            ],
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ResourceForecast {
    pub resource: ResourceType,
    pub current_utilization: f64,
    pub projected: Vec<f64>,
    pub is_constrained: bool,
}

#[derive(Debug, Default)]
struct ResourceWindow {
    samples: Vec<f64>,
}

pub struct BottleneckDetector {
    windows: Mutex<HashMap<ResourceType, ResourceWindow>>,
    saturation_threshold: f64,
    critical_threshold: f64,
    alert_horizon: chrono::Duration,
}

impl BottleneckDetector {
    pub fn new(saturation_threshold: f64, critical_threshold: f64, alert_horizon: chrono::Duration) -> Self {
        Self { windows: Mutex::new(HashMap::new()), saturation_threshold, critical_threshold, alert_horizon }
    }

    /// `value` is normalized utilization in [0, 1]; out-of-range values are
    /// clamped rather than rejected, since a caller's instrumentation
    /// glitch shouldn't poison the whole window.
    pub fn observe(&self, resource: ResourceType, value: f64) {
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(resource).or_default();
        window.samples.push(value.clamp(0.0, 1.0));
        if window.samples.len() > MAX_SAMPLES_PER_RESOURCE {
            window.samples.remove(0);
        }
    }

    /// Linear trend (simple least-squares slope over sample index) plus
    /// current/peak check against the saturation and critical thresholds.
    /// Severity upgrades to at least medium if the projected
    /// time-to-saturation falls inside `alert_horizon` (spec §4.9).
    pub fn detect(&self) -> Vec<BottleneckAlert> {
        let windows = self.windows.lock().unwrap();
        let mut alerts = Vec::new();

        for (resource, window) in windows.iter() {
            if window.samples.is_empty() {
                continue;
            }
            let current = *window.samples.last().unwrap();
            let trend = linear_trend(&window.samples);

            let mut severity = if current >= self.critical_threshold {
                BottleneckSeverity::Critical
            } else if current >= self.saturation_threshold {
                BottleneckSeverity::High
            } else {
                BottleneckSeverity::Low
            };

            let time_to_saturation = predict_saturation_time(current, trend, self.saturation_threshold);
            if severity == BottleneckSeverity::Low {
                if let Some(hours) = time_to_saturation {
                    let horizon_hours = self.alert_horizon.num_minutes() as f64 / 60.0;
                    let near_term_hours = horizon_hours * NEAR_TERM_HORIZON_FRACTION;
                    if hours > 0.0 && hours <= near_term_hours {
                        severity = BottleneckSeverity::High;
                    } else if hours > 0.0 && hours <= horizon_hours {
                        severity = BottleneckSeverity::Medium;
                    }
                }
            }

            if severity == BottleneckSeverity::Low {
                continue;
            }

            alerts.push(BottleneckAlert {
                resource: resource.to_string(),
                severity,
                current_utilization: current,
                predicted_time_to_saturation_minutes: time_to_saturation.map(|h| h * 60.0),
                mitigation: resource.mitigations().iter().map(|s| s.to_string()).collect(),
            });
        }

        alerts
    }

    /// Projects `current + trend * (i + 1)` for `FORECAST_STEPS_AHEAD`
    /// steps; `is_constrained` when either the current reading or the
    /// peak projected value reaches the saturation threshold (spec §4.9).
    pub fn forecast(&self, resource: ResourceType) -> Option<ResourceForecast> {
        let windows = self.windows.lock().unwrap();
        let window = windows.get(&resource)?;
        if window.samples.is_empty() {
            return None;
        }
        let current = *window.samples.last().unwrap();
        let trend = linear_trend(&window.samples);

        let projected: Vec<f64> =
            (0..FORECAST_STEPS_AHEAD).map(|i| (current + trend * (i as f64 + 1.0)).clamp(0.0, 1.5)).collect();
        let peak = projected.iter().cloned().fold(current, f64::max);
        let is_constrained = current >= self.saturation_threshold || peak >= self.saturation_threshold;

        Some(ResourceForecast { resource, current_utilization: current, projected, is_constrained })
    }

    pub fn forecast_all(&self) -> Vec<ResourceForecast> {
        ResourceType::ALL.iter().filter_map(|r| self.forecast(*r)).collect()
    }

    /// `1 / (1 + coefficient_of_variation)` clamped to `[0.5, 1.0]`; under
    /// 5 samples there isn't enough signal, so a neutral 0.5 is returned
    /// (spec §4.9).
    pub fn prediction_confidence(&self, resource: ResourceType) -> f64 {
        let windows = self.windows.lock().unwrap();
        let Some(window) = windows.get(&resource) else {
            return 0.5;
        };
        if window.samples.len() < 5 {
            return 0.5;
        }
        let m = window.samples.iter().sum::<f64>() / window.samples.len() as f64;
        if m.abs() < f64::EPSILON {
            return 0.5;
        }
        let variance =
            window.samples.iter().map(|v| (v - m).powi(2)).sum::<f64>() / window.samples.len() as f64;
        let cv = variance.sqrt() / m.abs();
        (1.0 / (1.0 + cv)).clamp(0.5, 1.0)
    }
}

/// Least-squares slope per sample step.
fn linear_trend(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let n = samples.len() as f64;
    let x_mean = (samples.len() as f64 - 1.0) / 2.0;
    let y_mean = samples.iter().sum::<f64>() / n;

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (i, &y) in samples.iter().enumerate() {
        let x = i as f64;
        ss_xy += (x - x_mean) * (y - y_mean);
        ss_xx += (x - x_mean).powi(2);
    }
    if ss_xx <= 0.0 {
        0.0
    } else {
        ss_xy / ss_xx
    }
}

/// Hours until `current` reaches `threshold` at the observed per-step
/// `trend`, reinterpreted as one step per hour. `None` for a flat/falling
/// trend (never saturates); `Some(0.0)` if already at/above threshold.
fn predict_saturation_time(current: f64, trend: f64, threshold: f64) -> Option<f64> {
    if current >= threshold {
        return Some(0.0);
    }
    if trend <= 0.0 {
        return None;
    }
    Some((threshold - current) / trend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_utilization_yields_no_alert() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        for _ in 0..10 {
            detector.observe(ResourceType::Cpu, 0.3);
        }
        assert!(detector.detect().is_empty());
    }

    #[test]
    fn critical_utilization_yields_critical_alert_with_mitigations() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        for _ in 0..10 {
            detector.observe(ResourceType::Memory, 0.97);
        }
        let alerts = detector.detect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, BottleneckSeverity::Critical);
        assert_eq!(alerts[0].mitigation.len(), 5);
    }

    #[test]
    fn rising_trend_within_horizon_upgrades_to_medium() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        for i in 0..10 {
            detector.observe(ResourceType::Io, 0.5 + i as f64 * 0.03);
        }
        let alerts = detector.detect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, BottleneckSeverity::Medium);
    }

    #[test]
    fn imminent_saturation_within_horizon_upgrades_to_high() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        for sample in [0.70, 0.74, 0.78, 0.82] {
            detector.observe(ResourceType::Cpu, sample);
        }
        let alerts = detector.detect();
        assert_eq!(alerts.len(), 1);
        assert!(matches!(alerts[0].severity, BottleneckSeverity::High | BottleneckSeverity::Critical));
    }

    #[test]
    fn forecast_marks_constrained_when_peak_hits_threshold() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        for i in 0..10 {
            detector.observe(ResourceType::Network, 0.5 + i as f64 * 0.03);
        }
        let forecast = detector.forecast(ResourceType::Network).unwrap();
        assert!(forecast.is_constrained);
    }

    #[test]
    fn confidence_below_five_samples_is_neutral() {
        let detector = BottleneckDetector::new(0.85, 0.95, chrono::Duration::hours(4));
        detector.observe(ResourceType::Disk, 0.4);
        assert_eq!(detector.prediction_confidence(ResourceType::Disk), 0.5);
    }
}
