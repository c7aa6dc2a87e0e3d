//! Simplified ARIMA(1,1,1) and Holt-style exponential smoothing, combined
//! into an averaging ensemble (spec §4.9). Point forecasts and confidence
//! widths are both averaged across whichever member models fit; neither
//! model requires external crates, matching the rest of the Predictor's
//! from-scratch numerics.

const EXP_SMOOTHING_ALPHA: f64 = 0.3;
const EXP_SMOOTHING_BETA: f64 = 0.1;
const MA_COEFFICIENT: f64 = 0.05;
const MIN_ENSEMBLE_POINTS: usize = 10;

#[derive(Debug, Clone)]
pub struct Forecast {
    pub predictions: Vec<f64>,
    pub confidence_widths: Vec<f64>,
}

struct Arima {
    ar_coef: f64,
    ma_coef: f64,
    mean: f64,
    residual_std: f64,
    last_value: f64,
}

impl Arima {
    /// Differences once (d=1), estimates a single AR(1) coefficient via an
    /// autocorrelation approximation, and fixes the MA(1) coefficient at
    /// 0.05 (mirrors the upstream model's simplification).
    fn fit(data: &[f64]) -> Option<Self> {
        if data.len() < 7 {
            return None;
        }
        let differenced = difference(data);
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let ar_coef = estimate_ar1(&differenced);
        let residuals = residuals(&differenced, ar_coef);
        let residual_std = if residuals.is_empty() {
            1.0
        } else {
            (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
        };

        Some(Self { ar_coef, ma_coef: MA_COEFFICIENT, mean, residual_std, last_value: *data.last().unwrap() })
    }

    fn forecast(&self, steps_ahead: usize) -> Forecast {
        let mut predictions = Vec::with_capacity(steps_ahead);
        let mut confidence_widths = Vec::with_capacity(steps_ahead);
        let mut current = self.last_value;

        for i in 0..steps_ahead {
            current = self.mean + self.ar_coef * (current - self.mean) + self.ma_coef * 0.0;
            let point = current.max(0.0);
            predictions.push(point);
            confidence_widths.push(self.residual_std * ((i + 1) as f64).sqrt() * 1.96);
        }

        Forecast { predictions, confidence_widths }
    }
}

fn difference(data: &[f64]) -> Vec<f64> {
    if data.len() < 2 {
        return data.to_vec();
    }
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Autocorrelation-at-lag-1 scaled by `1 / (1 + sqrt(lag))`, clamped to
/// `[-0.5, 0.5]` - a crude Yule-Walker stand-in adequate for a short-term
/// planning forecast, not a statistically rigorous fit.
fn estimate_ar1(differenced: &[f64]) -> f64 {
    if differenced.len() < 6 {
        return 0.1;
    }
    let n = differenced.len();
    let correlation: f64 = (1..n).map(|i| differenced[i] * differenced[i - 1]).sum::<f64>() / (n - 1) as f64;
    (correlation / (1.0 + 2.0_f64.sqrt())).clamp(-0.5, 0.5)
}

fn residuals(differenced: &[f64], ar_coef: f64) -> Vec<f64> {
    if differenced.len() < 2 {
        return differenced.to_vec();
    }
    (1..differenced.len()).map(|i| differenced[i] - ar_coef * differenced[i - 1]).collect()
}

struct ExponentialSmoothing {
    level: f64,
    trend: f64,
}

impl ExponentialSmoothing {
    /// Holt's linear method: level and trend both smoothed, no seasonal
    /// component (the upstream model's seasonal factors default to 1.0
    /// for the horizons this predictor ever forecasts over).
    fn fit(data: &[f64]) -> Option<Self> {
        if data.len() < 3 {
            return None;
        }
        let mut level = data[0];
        let mut trend = (data[data.len() - 1] - data[0]) / (data.len() - 1) as f64;

        for &value in data {
            let prev_level = level;
            level = EXP_SMOOTHING_ALPHA * value + (1.0 - EXP_SMOOTHING_ALPHA) * (prev_level + trend);
            trend = EXP_SMOOTHING_BETA * (level - prev_level) + (1.0 - EXP_SMOOTHING_BETA) * trend;
        }

        Some(Self { level, trend })
    }

    fn forecast(&self, steps_ahead: usize) -> Forecast {
        let mut predictions = Vec::with_capacity(steps_ahead);
        let mut confidence_widths = Vec::with_capacity(steps_ahead);

        for i in 0..steps_ahead {
            let point = (self.level + (i as f64 + 1.0) * self.trend).max(0.0);
            predictions.push(point);
            confidence_widths.push(self.trend.abs() * (i as f64 + 1.0) * 0.5 + 1.0);
        }

        Forecast { predictions, confidence_widths }
    }
}

/// Averages the ARIMA and exponential-smoothing forecasts, member-model
/// point estimates and confidence widths both. Requires at least
/// `MIN_ENSEMBLE_POINTS` observations; returns `None` when neither model
/// fits (spec §4.9 "at least 10 data points").
pub fn ensemble_forecast(data: &[f64], steps_ahead: usize) -> Option<Forecast> {
    if data.len() < MIN_ENSEMBLE_POINTS {
        return None;
    }

    let arima = Arima::fit(data).map(|m| m.forecast(steps_ahead));
    let smoothing = ExponentialSmoothing::fit(data).map(|m| m.forecast(steps_ahead));

    let members: Vec<Forecast> = [arima, smoothing].into_iter().flatten().collect();
    if members.is_empty() {
        return None;
    }

    let predictions: Vec<f64> = (0..steps_ahead)
        .map(|i| members.iter().map(|f| f.predictions[i]).sum::<f64>() / members.len() as f64)
        .collect();
    let confidence_widths: Vec<f64> = (0..steps_ahead)
        .map(|i| members.iter().map(|f| f.confidence_widths[i]).sum::<f64>() / members.len() as f64)
        .collect();

    Some(Forecast { predictions, confidence_widths })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewer_than_ten_points_yields_no_forecast() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(ensemble_forecast(&data, 3).is_none());
    }

    #[test]
    fn rising_series_forecasts_nonnegative_and_grows_uncertainty() {
        let data: Vec<f64> = (0..20).map(|i| i as f64 * 1.5).collect();
        let forecast = ensemble_forecast(&data, 5).unwrap();
        assert_eq!(forecast.predictions.len(), 5);
        assert!(forecast.predictions.iter().all(|p| *p >= 0.0));
        assert!(forecast.confidence_widths[4] >= forecast.confidence_widths[0]);
    }
}
