//! Minstrel-HT configuration and constants.
//!
//! Probabilities are fixed-point: 0..=18000 maps to 0..=100%, i.e. one
//! percent is 180 units. All thresholds below are expressed on that scale.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::error::ConfigError;

/// Highest number of spatial streams a group can use.
pub const MAX_SUPPORTED_STREAMS: u8 = 4;

/// Modulation indices per group; also the stride of a [`RateId`](super::RateId).
pub const MAX_GROUP_RATES: usize = 8;

/// streams x {long, short} GI x {20, 40} MHz.
pub const N_GROUPS: usize = 2 * 2 * MAX_SUPPORTED_STREAMS as usize;

/// Fixed-point scale of a success probability.
pub const PROB_SCALE: u32 = 18_000;

/// One percent on the [`PROB_SCALE`].
pub(crate) const PROB_PERCENT: u32 = PROB_SCALE / 100;

/// Below 10% a rate contributes no throughput.
pub(crate) const MIN_THROUGHPUT_PROB: u32 = 10 * PROB_PERCENT;

/// Throughput is computed with the probability capped at 90%, to ride out
/// collision-driven loss.
pub(crate) const MAX_THROUGHPUT_PROB: u32 = 90 * PROB_PERCENT;

/// Rates above 95% are not worth sampling and get a reduced retry budget.
pub(crate) const HIGH_PROB: u32 = 95 * PROB_PERCENT;

/// Retry budget applied to rates that are near-certain or near-hopeless.
pub(crate) const EXTREME_PROB_RETRY_CAP: u32 = 2;

/// Upper bound on the per-rate retry budget.
pub(crate) const MAX_RETRY_COUNT: u32 = 10;

/// Worst-case airtime a full retry sequence at one rate may take.
pub(crate) const MAX_RETRY_AIRTIME: Duration = Duration::from_millis(6);

/// Contention window bounds used when estimating retry backoff.
pub(crate) const CW_MIN: u32 = 31;
pub(crate) const CW_MAX: u32 = 1023;

/// Frame and sample counters restart once this many frames were sent.
pub(crate) const FRAME_COUNT_RESET: u32 = 10_000;

/// Refresh cycles a rate must sit idle before a slow sample is forced.
pub(crate) const SLOW_SAMPLE_SKIP_THRESHOLD: u32 = 20;

/// Slow samples allowed per refresh cycle.
pub(crate) const MAX_SLOW_SAMPLES: u32 = 2;

/// Configuration for the Minstrel-HT rate controller.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinstrelHtConfig {
    /// Interval between statistics refreshes.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "update_stats_ms")]
    pub update_stats: Duration,
    /// Percentage of frames spent sampling other rates (0-100).
    pub look_around_rate: u32,
    /// Weight of the previous EWMA value, in percent (0-100).
    pub ewma_level: u32,
    /// Columns of the sampling table.
    pub sample_columns: usize,
    /// Frame length in bytes used to compute ideal airtime.
    pub frame_length: u32,
    /// Seed of the controller's RNG. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for MinstrelHtConfig {
    fn default() -> Self {
        Self {
            update_stats: Duration::from_millis(100),
            look_around_rate: 10,
            ewma_level: 75,
            sample_columns: 10,
            frame_length: 1200,
            seed: None,
        }
    }
}

impl MinstrelHtConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.look_around_rate > 100 {
            return Err(ConfigError::OutOfRange {
                name: "look_around_rate",
                value: self.look_around_rate.into(),
                max: 100,
            });
        }
        if self.ewma_level > 100 {
            return Err(ConfigError::OutOfRange {
                name: "ewma_level",
                value: self.ewma_level.into(),
                max: 100,
            });
        }
        if self.sample_columns == 0 {
            return Err(ConfigError::Zero("sample_columns"));
        }
        if self.frame_length == 0 {
            return Err(ConfigError::Zero("frame_length"));
        }
        if self.update_stats.is_zero() {
            return Err(ConfigError::Zero("update_stats"));
        }
        Ok(())
    }
}
