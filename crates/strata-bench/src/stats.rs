//! Latency statistics over per-call samples.

use std::time::Duration;

/// Summary of a latency sample set, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
  pub mean:   f64,
  pub median: f64,
  pub stdev:  f64,
  pub min:    f64,
  pub max:    f64,
}

impl LatencyStats {
  /// Returns `None` for an empty sample set. The standard deviation is the
  /// sample standard deviation (n - 1 denominator).
  pub fn from_samples(samples: &[Duration]) -> Option<Self> {
    if samples.is_empty() {
      return None;
    }

    let mut millis: Vec<f64> =
      samples.iter().map(|d| d.as_secs_f64() * 1e3).collect();
    millis.sort_by(f64::total_cmp);

    let n = millis.len();
    let mean = millis.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
      (millis[n / 2 - 1] + millis[n / 2]) / 2.0
    } else {
      millis[n / 2]
    };
    let stdev = if n > 1 {
      let variance =
        millis.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
      variance.sqrt()
    } else {
      0.0
    };

    Some(Self { mean, median, stdev, min: millis[0], max: millis[n - 1] })
  }
}
