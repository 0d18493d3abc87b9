use serde::Serialize;

use crate::prober::RawOutcome;

/// Summary of one probe session.
///
/// `loss` is always set. The latency fields are `None` when no reply came back,
/// so "no data" never looks like a 0 ms latency.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryResult {
    pub loss: f64,
    pub avg: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// Population standard deviation of the latencies.
    pub mdev: Option<f64>,
}

impl SummaryResult {
    /// Result for a target we could not even send to.
    pub fn total_loss() -> Self {
        Self {
            loss: 100.0,
            ..Default::default()
        }
    }

    /// Look up a metric by its catalogue name.
    pub fn get(&self, stat: &str) -> Option<f64> {
        match stat {
            "loss" => Some(self.loss),
            "avg" => self.avg,
            "min" => self.min,
            "max" => self.max,
            "median" => self.median,
            "mdev" => self.mdev,
            _ => None,
        }
    }
}

/// Reduce a raw outcome to the summary metrics. Latencies are reported in ms.
pub fn summarize(outcome: &RawOutcome) -> SummaryResult {
    let fail_count = outcome.sent.saturating_sub(outcome.received);
    let loss = if outcome.sent == 0 {
        100.0
    } else if fail_count == 0 {
        0.0
    } else {
        100.0 * (fail_count as f64 / outcome.sent as f64)
    };

    let mut measurements: Vec<f64> = outcome
        .latencies
        .iter()
        .map(|d| d.as_secs_f64() * 1000.0)
        .collect();
    if measurements.is_empty() {
        return SummaryResult {
            loss,
            ..Default::default()
        };
    }

    let n = measurements.len() as f64;
    let mut tsum = 0.0;
    let mut tsum2 = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &r in &measurements {
        min = min.min(r);
        max = max.max(r);
        tsum += r;
        tsum2 += r * r;
    }
    let avg = tsum / n;
    // Cancellation can push this a hair below zero for identical samples.
    let mdev = (tsum2 / n - avg * avg).max(0.0).sqrt();

    // Upper-middle element for even sizes, not the mean of the two middle
    // values. Downstream dashboards depend on this.
    measurements.sort_by(f64::total_cmp);
    let median = measurements[measurements.len() / 2];

    SummaryResult {
        loss,
        avg: Some(avg),
        min: Some(min),
        max: Some(max),
        median: Some(median),
        mdev: Some(mdev),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outcome(sent: u32, ms: &[u64]) -> RawOutcome {
        RawOutcome::new(sent, ms.iter().map(|&m| Duration::from_millis(m)).collect())
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("metric should be present");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn all_replies_received() {
        let result = summarize(&outcome(3, &[10, 20, 30]));
        assert_eq!(result.loss, 0.0);
        assert_close(result.avg, 20.0);
        assert_close(result.min, 10.0);
        assert_close(result.max, 30.0);
        assert_close(result.median, 20.0);
        assert!((result.mdev.unwrap() - 8.16496580927726).abs() < 1e-6);
    }

    #[test]
    fn even_sample_median_takes_upper_middle() {
        let result = summarize(&outcome(4, &[40, 10, 30, 20]));
        assert_close(result.median, 30.0);
        assert_close(result.avg, 25.0);
    }

    #[test]
    fn no_replies_only_loss() {
        let result = summarize(&outcome(5, &[]));
        assert_eq!(result.loss, 100.0);
        assert_eq!(result.avg, None);
        assert_eq!(result.min, None);
        assert_eq!(result.max, None);
        assert_eq!(result.median, None);
        assert_eq!(result.mdev, None);
    }

    #[test]
    fn nothing_sent_is_total_loss() {
        let result = summarize(&RawOutcome::default());
        assert_eq!(result, SummaryResult::total_loss());
    }

    #[test]
    fn partial_loss() {
        for received in 0..=5u64 {
            let ms: Vec<u64> = (1..=received).collect();
            let result = summarize(&outcome(5, &ms));
            assert_eq!(result.loss, 100.0 * (5 - received) as f64 / 5.0);
            assert!((0.0..=100.0).contains(&result.loss));
        }
    }

    #[test]
    fn min_max_independent_of_arrival_order() {
        let result = summarize(&outcome(4, &[25, 5, 90, 12]));
        assert_close(result.min, 5.0);
        assert_close(result.max, 90.0);
    }

    #[test]
    fn identical_samples_have_zero_mdev() {
        let result = summarize(&RawOutcome::new(3, vec![Duration::from_micros(1100); 3]));
        let mdev = result.mdev.unwrap();
        assert!(!mdev.is_nan());
        assert!(mdev < 1e-6, "mdev {mdev}");
        assert_close(result.median, 1.1);
    }

    #[test]
    fn single_sample() {
        let result = summarize(&outcome(1, &[7]));
        assert_close(result.median, 7.0);
        assert_close(result.mdev, 0.0);
    }

    #[test]
    fn get_by_name() {
        let result = summarize(&outcome(2, &[10]));
        assert_eq!(result.get("loss"), Some(50.0));
        assert_eq!(result.get("avg"), Some(10.0));
        assert_eq!(result.get("bogus"), None);
    }
}
