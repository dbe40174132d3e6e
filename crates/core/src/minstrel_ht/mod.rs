//! Minstrel-HT rate and retry adaptation.
//!
//! For every peer the controller keeps success statistics of each HT rate,
//! sends most frames at the rate with the best expected throughput, and
//! spends a configurable share of frames (`look_around_rate`) probing other
//! rates so the statistics stay fresh.
//!
//! ## Rate space
//!
//! Rates are grouped by (spatial streams, guard interval, channel width);
//! inside a group a rate is a modulation index. A [`RateId`] packs both as
//! `group * 8 + index`:
//!
//! | Group | Streams | Short GI | Width  |
//! |-------|---------|----------|--------|
//! | 0-3   | 1-4     | no       | 20 MHz |
//! | 4-7   | 1-4     | yes      | 20 MHz |
//! | 8-11  | 1-4     | no       | 40 MHz |
//! | 12-15 | 1-4     | yes      | 40 MHz |
//!
//! ## Statistics refresh
//!
//! Every `update_stats` interval the attempts and successes of the running
//! cycle are folded into an EWMA of the success probability; throughput is
//! the probability (capped at 90%, ignored below 10%) over the ideal airtime.
//! The refresh then picks per group and overall the best throughput, second
//! best throughput and most reliable rate.
//!
//! ## Retry chain
//!
//! A failing frame falls back through three tiers, each allowed the adjusted
//! retry count of its rate; see [`RetryChain`].
//!
//! Peers without HT support are handed to [`crate::legacy`].

mod config;
mod groups;
mod manager;
mod rate_id;
mod retry;
mod sample;
mod station;
mod stats;

#[cfg(test)]
mod tests;

pub use config::{
    MinstrelHtConfig, MAX_GROUP_RATES, MAX_SUPPORTED_STREAMS, N_GROUPS, PROB_SCALE,
};
pub use groups::{GroupTable, McsGroup};
pub use manager::{MinstrelHtManager, StationStats};
pub use rate_id::RateId;
pub use retry::{RetryChain, RetryTier};
pub use sample::{SampleCursor, SampleTable};
pub use station::{HtStation, HtStationStats};
pub use stats::RateStats;

pub(crate) use config::{FRAME_COUNT_RESET, HIGH_PROB, SLOW_SAMPLE_SKIP_THRESHOLD};
pub(crate) use station::{RateDecision, StationContext};
pub(crate) use stats::retry_count_for;
