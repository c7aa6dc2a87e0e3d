//! Temporal Reasoner: per-metric pattern detection over a bounded
//! observation history (spec §4.9).
//!
//! Four pattern kinds, each gated by a minimum sample size and a shared
//! `min_pattern_strength` (default 0.6) before it's surfaced at all:
//! stationarity (variance ratio of the two halves), trend (OLS slope with
//! R² as strength), cyclicality (autocorrelation at a handful of candidate
//! periods), and anomaly rate (z-score outlier fraction).

use std::collections::HashMap;
use std::sync::Mutex;

use tasker_shared::types::TemporalPattern;

const MAX_OBSERVATIONS_PER_METRIC: usize = 500;
const CANDIDATE_PERIODS: [usize; 3] = [24, 168, 720];

#[derive(Debug, Default)]
pub struct TemporalReasoner {
    history: Mutex<HashMap<String, Vec<f64>>>,
    min_pattern_strength: f64,
}

impl TemporalReasoner {
    pub fn new() -> Self {
        Self { history: Mutex::new(HashMap::new()), min_pattern_strength: 0.6 }
    }

    pub fn with_min_pattern_strength(mut self, min_pattern_strength: f64) -> Self {
        self.min_pattern_strength = min_pattern_strength;
        self
    }

    pub fn observe(&self, metric: &str, value: f64) {
        let mut history = self.history.lock().unwrap();
        let series = history.entry(metric.to_string()).or_default();
        series.push(value);
        if series.len() > MAX_OBSERVATIONS_PER_METRIC {
            series.remove(0);
        }
    }

    pub fn has_history(&self) -> bool {
        !self.history.lock().unwrap().is_empty()
    }

    pub fn metric_count(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Every pattern this metric's history currently exhibits above
    /// `min_pattern_strength`, strongest first.
    pub fn analyze_patterns(&self, metric: &str) -> Vec<TemporalPattern> {
        let history = self.history.lock().unwrap();
        let Some(series) = history.get(metric) else {
            return Vec::new();
        };

        let mut patterns = Vec::new();
        if let Some(p) = stationarity_pattern(metric, series) {
            patterns.push(p);
        }
        if let Some(p) = trend_pattern(metric, series) {
            patterns.push(p);
        }
        if let Some(p) = cyclicality_pattern(metric, series) {
            patterns.push(p);
        }
        if let Some(p) = anomaly_pattern(metric, series) {
            patterns.push(p);
        }

        patterns.retain(|p| p.strength > self.min_pattern_strength);
        patterns.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
        patterns
    }

    pub fn analyze_all(&self) -> Vec<TemporalPattern> {
        let metrics: Vec<String> = self.history.lock().unwrap().keys().cloned().collect();
        metrics.iter().flat_map(|m| self.analyze_patterns(m)).collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64], mean_value: f64) -> f64 {
    values.iter().map(|v| (v - mean_value).powi(2)).sum::<f64>() / values.len() as f64
}

/// Ratio of the first-half to second-half variance, clamped to [0, 1] via
/// `min/max`; needs at least 10 points, and a zero variance in either
/// half falls back to a neutral 0.5 (can't judge stationarity without
/// spread).
fn stationarity_pattern(metric: &str, series: &[f64]) -> Option<TemporalPattern> {
    if series.len() < 10 {
        return None;
    }
    let mid = series.len() / 2;
    let first = &series[..mid];
    let second = &series[mid..];
    let var1 = variance(first, mean(first));
    let var2 = variance(second, mean(second));

    let strength = if var1 <= 0.0 || var2 <= 0.0 { 0.5 } else { var1.min(var2) / var1.max(var2) };

    Some(TemporalPattern {
        metric: metric.to_string(),
        kind: "stationarity".to_string(),
        strength,
        description: format!("variance ratio {strength:.2} between first and second half"),
    })
}

/// Ordinary-least-squares slope over the index, strength = R².
fn trend_pattern(metric: &str, series: &[f64]) -> Option<TemporalPattern> {
    if series.len() < 3 {
        return None;
    }
    let n = series.len() as f64;
    let xs: Vec<f64> = (0..series.len()).map(|i| i as f64).collect();
    let x_mean = mean(&xs);
    let y_mean = mean(series);

    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for i in 0..series.len() {
        ss_xy += (xs[i] - x_mean) * (series[i] - y_mean);
        ss_xx += (xs[i] - x_mean).powi(2);
    }
    if ss_xx <= 0.0 {
        return None;
    }
    let slope = ss_xy / ss_xx;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = series.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = xs.iter().zip(series).map(|(x, y)| (y - (slope * x + intercept)).powi(2)).sum();
    let r_squared = if ss_tot <= 0.0 { 0.0 } else { (1.0 - ss_res / ss_tot).max(0.0) };

    let direction = if slope > 0.0 { "increasing" } else if slope < 0.0 { "decreasing" } else { "flat" };
    let _ = n;

    Some(TemporalPattern {
        metric: metric.to_string(),
        kind: "trend".to_string(),
        strength: r_squared,
        description: format!("{direction} trend, slope {slope:.4}, R² {r_squared:.2}"),
    })
}

/// Autocorrelation at a handful of candidate periods (24/168/720 sample
/// units); a period only qualifies when it fits twice over in the
/// history and its own autocorrelation exceeds 0.5. Keeps the strongest
/// candidate.
fn cyclicality_pattern(metric: &str, series: &[f64]) -> Option<TemporalPattern> {
    if series.len() < 20 {
        return None;
    }
    let m = mean(series);
    let var = variance(series, m);
    if var <= 0.0 {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for &period in &CANDIDATE_PERIODS {
        if period >= series.len() / 2 {
            continue;
        }
        let autocorr = autocorrelation(series, period, m, var);
        if autocorr > 0.5 && best.map(|(_, s)| autocorr > s).unwrap_or(true) {
            best = Some((period, autocorr));
        }
    }

    best.map(|(period, strength)| TemporalPattern {
        metric: metric.to_string(),
        kind: "cyclicality".to_string(),
        strength,
        description: format!("cyclic with period {period}, autocorrelation {strength:.2}"),
    })
}

fn autocorrelation(series: &[f64], lag: usize, mean_value: f64, variance_value: f64) -> f64 {
    let n = series.len();
    let covariance: f64 =
        (lag..n).map(|i| (series[i] - mean_value) * (series[i - lag] - mean_value)).sum::<f64>() / (n - lag) as f64;
    covariance / variance_value
}

/// Outlier rate at |z| > 2, doubled and clamped to [0, 1] so a 50%
/// outlier rate already saturates the strength.
fn anomaly_pattern(metric: &str, series: &[f64]) -> Option<TemporalPattern> {
    if series.len() < 5 {
        return None;
    }
    let m = mean(series);
    let std_dev = variance(series, m).sqrt();
    if std_dev <= 0.0 {
        return None;
    }

    let outliers = series.iter().filter(|v| ((*v - m) / std_dev).abs() > 2.0).count();
    let rate = outliers as f64 / series.len() as f64;
    let strength = (rate * 2.0).min(1.0);

    Some(TemporalPattern {
        metric: metric.to_string(),
        kind: "anomaly".to_string(),
        strength,
        description: format!("{outliers} of {} observations beyond 2 std deviations", series.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_yields_no_patterns() {
        let reasoner = TemporalReasoner::new();
        reasoner.observe("cpu", 0.5);
        reasoner.observe("cpu", 0.6);
        assert!(reasoner.analyze_patterns("cpu").is_empty());
    }

    #[test]
    fn strong_linear_trend_is_detected() {
        let reasoner = TemporalReasoner::new();
        for i in 0..30 {
            reasoner.observe("latency", i as f64 * 2.0);
        }
        let patterns = reasoner.analyze_patterns("latency");
        assert!(patterns.iter().any(|p| p.kind == "trend" && p.strength > 0.9));
    }

    #[test]
    fn history_caps_at_500_observations() {
        let reasoner = TemporalReasoner::new();
        for i in 0..600 {
            reasoner.observe("m", i as f64);
        }
        assert_eq!(reasoner.history.lock().unwrap().get("m").unwrap().len(), 500);
    }
}
