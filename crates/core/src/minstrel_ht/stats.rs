//! Per-rate statistics and the arithmetic of one refresh cycle.

use std::time::Duration;

use serde::Serialize;

use super::config::{
    CW_MAX, CW_MIN, EXTREME_PROB_RETRY_CAP, HIGH_PROB, MAX_RETRY_AIRTIME, MAX_RETRY_COUNT,
    MAX_THROUGHPUT_PROB, MIN_THROUGHPUT_PROB, PROB_SCALE,
};

/// Statistics of one rate towards one receiver.
///
/// `attempts` and `successes` only cover the running refresh cycle; they are
/// folded into `prob`, `ewma_prob` and `throughput` and cleared on refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateStats {
    pub attempts: u32,
    pub successes: u32,
    /// Success probability of the last cycle that had attempts, 0..=18000.
    pub prob: u32,
    /// Smoothed success probability, 0..=18000.
    pub ewma_prob: u32,
    /// Probability-weighted inverse airtime.
    pub throughput: u64,
    pub perfect_tx_time: Duration,
    /// Retry budget derived from airtime at station initialization.
    pub retry_count: u32,
    /// Retry budget currently in force.
    pub adjusted_retry_count: u32,
    /// Consecutive refresh cycles without any attempt.
    pub samples_skipped: u32,
    pub attempt_hist: u64,
    pub success_hist: u64,
}

impl RateStats {
    pub(crate) fn new(perfect_tx_time: Duration, retry_count: u32) -> Self {
        Self {
            perfect_tx_time,
            retry_count,
            adjusted_retry_count: retry_count,
            ..Default::default()
        }
    }

    pub(crate) fn record_success(&mut self) {
        self.successes += 1;
        self.attempts += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.attempts += 1;
    }

    /// Folds the running cycle into the derived metrics and starts a new cycle.
    pub(crate) fn refresh(&mut self, ewma_level: u32) {
        let tx_micros = match self.perfect_tx_time.as_micros() as u64 {
            0 => 1_000_000,
            us => us,
        };

        if self.attempts > 0 {
            self.samples_skipped = 0;
            self.attempt_hist += u64::from(self.attempts);
            self.success_hist += u64::from(self.successes);

            let prob =
                (u64::from(self.successes) * u64::from(PROB_SCALE) / u64::from(self.attempts)) as u32;
            self.prob = prob;
            self.ewma_prob = (prob * (100 - ewma_level) + self.ewma_prob * ewma_level) / 100;

            self.throughput = if self.ewma_prob < MIN_THROUGHPUT_PROB {
                0
            } else {
                u64::from(self.ewma_prob.min(MAX_THROUGHPUT_PROB)) * (1_000_000 / tx_micros)
            };
        } else {
            self.samples_skipped += 1;
        }

        self.successes = 0;
        self.attempts = 0;

        self.adjusted_retry_count =
            if self.ewma_prob > HIGH_PROB || self.ewma_prob < MIN_THROUGHPUT_PROB {
                self.retry_count.min(EXTREME_PROB_RETRY_CAP)
            } else {
                self.retry_count
            }
            .max(1);
    }
}

/// Worst-case airtime of a unicast frame sent once and then retried
/// `long_retries` times, including the average backoff of each retry.
pub(crate) fn unicast_airtime(
    tx_time: Duration,
    ack_timeout: Duration,
    slot_time: Duration,
    long_retries: u32,
) -> Duration {
    let mut total = tx_time + ack_timeout;
    let mut cw = CW_MIN;
    for _ in 0..long_retries {
        total += tx_time + ack_timeout;
        total += slot_time * (cw / 2);
        cw = CW_MAX.min((cw + 1) * 2);
    }
    total
}

/// Largest retry budget in `2..=10` whose worst case stays within 6 ms, or 1
/// when even two retries would not fit.
pub(crate) fn retry_count_for(tx_time: Duration, ack_timeout: Duration, slot_time: Duration) -> u32 {
    let mut retry_count = 1;
    for retries in 2..=MAX_RETRY_COUNT {
        if unicast_airtime(tx_time, ack_timeout, slot_time, retries) > MAX_RETRY_AIRTIME {
            break;
        }
        retry_count = retries;
    }
    retry_count
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK_TIMEOUT: Duration = Duration::from_micros(75);
    const SLOT: Duration = Duration::from_micros(9);

    fn entry() -> RateStats {
        RateStats::new(Duration::from_micros(200), 4)
    }

    #[test]
    fn test_low_probability_zeroes_throughput() {
        let mut stats = entry();
        stats.attempts = 100;
        stats.successes = 5;
        stats.refresh(75);

        assert_eq!(stats.prob, 900);
        assert_eq!(stats.ewma_prob, 225);
        assert_eq!(stats.throughput, 0);
        assert_eq!(stats.attempts, 0);
        assert_eq!(stats.successes, 0);
    }

    #[test]
    fn test_throughput_capped_at_ninety_percent() {
        let mut stats = entry();
        stats.ewma_prob = PROB_SCALE;
        stats.attempts = 10;
        stats.successes = 10;
        stats.refresh(75);

        assert_eq!(stats.ewma_prob, PROB_SCALE);
        assert_eq!(stats.throughput, u64::from(MAX_THROUGHPUT_PROB) * 5_000);
    }

    #[test]
    fn test_ewma_blend() {
        let mut stats = entry();
        stats.ewma_prob = 9_000;
        stats.attempts = 4;
        stats.successes = 2;
        stats.refresh(75);
        // (9000 * 25 + 9000 * 75) / 100
        assert_eq!(stats.ewma_prob, 9_000);
        assert_eq!(stats.throughput, 9_000 * 5_000);

        stats.attempts = 1;
        stats.successes = 1;
        stats.refresh(75);
        assert_eq!(stats.ewma_prob, (18_000 * 25 + 9_000 * 75) / 100);
    }

    #[test]
    fn test_idle_cycle_counts_skips_and_keeps_metrics() {
        let mut stats = entry();
        stats.ewma_prob = 9_000;
        stats.throughput = 42;
        stats.refresh(75);
        stats.refresh(75);

        assert_eq!(stats.samples_skipped, 2);
        assert_eq!(stats.ewma_prob, 9_000);
        assert_eq!(stats.throughput, 42);

        stats.attempts = 1;
        stats.successes = 1;
        stats.refresh(75);
        assert_eq!(stats.samples_skipped, 0);
    }

    #[test]
    fn test_adjusted_retry_count_caps_at_extremes() {
        let mut stats = entry();
        // Nothing known yet: probability 0 is "very low".
        stats.refresh(75);
        assert_eq!(stats.adjusted_retry_count, 2);

        stats.ewma_prob = 9_000;
        stats.refresh(75);
        assert_eq!(stats.adjusted_retry_count, 4);

        stats.ewma_prob = 17_500;
        stats.refresh(75);
        assert_eq!(stats.adjusted_retry_count, 2);
        // Stays capped on consecutive cycles.
        stats.refresh(75);
        assert_eq!(stats.adjusted_retry_count, 2);
    }

    #[test]
    fn test_adjusted_retry_count_never_below_one() {
        let mut stats = RateStats::new(Duration::from_micros(200), 0);
        stats.ewma_prob = 9_000;
        stats.refresh(75);
        assert_eq!(stats.adjusted_retry_count, 1);
    }

    #[test]
    fn test_zero_duration_uses_sentinel() {
        let mut stats = RateStats::new(Duration::ZERO, 1);
        stats.attempts = 1;
        stats.successes = 1;
        stats.refresh(0);
        assert_eq!(stats.throughput, u64::from(MAX_THROUGHPUT_PROB));
    }

    #[test]
    fn test_unicast_airtime_includes_backoff() {
        let d = Duration::from_micros(1_000);
        assert_eq!(unicast_airtime(d, ACK_TIMEOUT, SLOT, 0), d + ACK_TIMEOUT);
        // One retry: a second transmission plus 15 slots of backoff.
        assert_eq!(
            unicast_airtime(d, ACK_TIMEOUT, SLOT, 1),
            (d + ACK_TIMEOUT) * 2 + SLOT * 15
        );
        // Second retry backs off over a window of 64.
        assert_eq!(
            unicast_airtime(d, ACK_TIMEOUT, SLOT, 2),
            (d + ACK_TIMEOUT) * 3 + SLOT * 15 + SLOT * 32
        );
    }

    #[test]
    fn test_retry_count_bounds() {
        // Slow rate: two retries fit, three do not.
        assert_eq!(
            retry_count_for(Duration::from_micros(1_520), ACK_TIMEOUT, SLOT),
            2
        );
        // Very fast rate: the growing backoff window is what runs out first.
        assert_eq!(
            retry_count_for(Duration::from_micros(50), ACK_TIMEOUT, SLOT),
            5
        );
        // Zero slot time leaves only airtime, capped at 10.
        assert_eq!(
            retry_count_for(Duration::from_micros(50), ACK_TIMEOUT, Duration::ZERO),
            MAX_RETRY_COUNT
        );
        // Too slow for even two retries.
        assert_eq!(
            retry_count_for(Duration::from_millis(3), ACK_TIMEOUT, SLOT),
            1
        );
    }
}
