use crate::config::ThresholdConfig;

/// Number of summed-channel intensity levels (0..=765).
pub const HISTOGRAM_BINS: usize = 766;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThresholdEstimate {
    /// Threshold used by the detector stages.
    pub threshold: u32,
    /// Value picked from the histogram before the ceiling check.
    pub histogram_minimum: u32,
    /// Whether the background-level fallback replaced the histogram value.
    pub from_background: bool,
}

/// Pick the separating intensity from a summed-channel histogram.
///
/// Bins above `lower_bound` are scanned for a running minimum; the scan
/// stops once `patience` bins pass without a new minimum. A result above
/// `ceiling` is replaced by `background_multiplier × background_level`.
pub fn estimate_threshold(
    histogram: &[u64],
    background_level: f64,
    cfg: &ThresholdConfig,
) -> ThresholdEstimate {
    let mut min_count = u64::MAX;
    let mut minimum = 0usize;
    let mut since = 0usize;
    for (bin, &count) in histogram.iter().enumerate().skip(cfg.lower_bound + 1) {
        if since >= cfg.patience {
            break;
        }
        if count < min_count {
            min_count = count;
            minimum = bin;
            since = 0;
        } else {
            since += 1;
        }
    }

    let histogram_minimum = minimum as u32;
    let from_background = histogram_minimum > cfg.ceiling;
    let threshold = if from_background {
        let fallback = (cfg.background_multiplier * background_level) as u32;
        tracing::warn!(
            histogram_minimum,
            fallback,
            "histogram threshold above ceiling; using background level"
        );
        fallback
    } else {
        histogram_minimum
    };

    ThresholdEstimate {
        threshold,
        histogram_minimum,
        from_background,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_valley_after_noisy_tail() {
        let mut hist = vec![0u64; HISTOGRAM_BINS];
        for (i, h) in hist.iter_mut().enumerate() {
            *h = match i {
                0..=100 => 5000 + (i as u64 * 37) % 200,
                101..=150 => 10 + (150 - i as u64) * 20,
                151..=400 => 10 + (i as u64 - 150) * 30,
                // Unreached: the patience window closes at bin 175.
                _ => 1,
            };
        }
        let est = estimate_threshold(&hist, 40.0, &ThresholdConfig::default());
        assert_eq!(est.threshold, 150);
        assert!(!est.from_background);
    }

    #[test]
    fn noise_bump_within_patience_is_skipped() {
        let mut hist = vec![1000u64; HISTOGRAM_BINS];
        hist[110] = 500;
        hist[111] = 600;
        hist[130] = 100;
        let est = estimate_threshold(&hist, 40.0, &ThresholdConfig::default());
        assert_eq!(est.threshold, 130);
    }

    #[test]
    fn high_minimum_falls_back_to_background() {
        let hist: Vec<u64> = (0..HISTOGRAM_BINS as u64).map(|i| 1000 - i).collect();
        let est = estimate_threshold(&hist, 42.7, &ThresholdConfig::default());
        assert_eq!(est.histogram_minimum, 765);
        assert!(est.from_background);
        assert_eq!(est.threshold, 128);
    }
}
