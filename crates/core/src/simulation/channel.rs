//! Distance driven loss model for simulated links.
//!
//! Received SNR follows a log-distance path loss. Each modulation needs a
//! minimum SNR; the delivery probability of a frame is a logistic curve
//! around that threshold, so rates well below the link budget almost always
//! get through and rates well above it almost never do.

use serde::{Deserialize, Serialize};

use super::rng::SimulationRng;
use crate::phy::{ChannelWidth, TxMode, TxVector};

/// SNR (dB) needed per stream by HT MCS 0-7.
const HT_REQUIRED_SNR_DB: [f64; 8] = [2.0, 5.0, 9.0, 11.0, 15.0, 18.0, 20.0, 25.0];
/// SNR (dB) needed by the ERP-OFDM rates, 6 to 54 Mbit/s.
const LEGACY_REQUIRED_SNR_DB: [f64; 8] = [2.0, 3.5, 5.0, 8.0, 11.0, 15.0, 19.0, 21.0];
/// Each extra spatial stream splits the transmit power.
const PER_STREAM_PENALTY_DB: f64 = 3.0;
const SHORT_GI_PENALTY_DB: f64 = 1.0;
const THERMAL_NOISE_DBM_PER_HZ: f64 = -174.0;

/// Link budget parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub tx_power_dbm: f64,
    /// Path loss at one metre.
    pub reference_loss_db: f64,
    pub path_loss_exponent: f64,
    pub noise_figure_db: f64,
    /// Slope of the delivery curve, per dB of margin.
    pub steepness: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            tx_power_dbm: 16.0,
            reference_loss_db: 46.7,
            path_loss_exponent: 3.0,
            noise_figure_db: 7.0,
            steepness: 1.5,
        }
    }
}

/// A one-way link to a peer at a given distance.
#[derive(Debug, Clone)]
pub struct LossyChannel {
    config: ChannelConfig,
    distance_m: f64,
    rng: SimulationRng,
}

impl LossyChannel {
    pub fn new(config: ChannelConfig, distance_m: f64, rng: SimulationRng) -> Self {
        Self {
            config,
            distance_m: distance_m.max(1.0),
            rng,
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance_m
    }

    /// Moves the peer; distances below one metre are clamped.
    pub fn set_distance(&mut self, distance_m: f64) {
        self.distance_m = distance_m.max(1.0);
    }

    pub fn snr_db(&self, width: ChannelWidth) -> f64 {
        let path_loss = self.config.reference_loss_db
            + 10.0 * self.config.path_loss_exponent * self.distance_m.log10();
        let bandwidth_hz = f64::from(width.mhz()) * 1e6;
        let noise_dbm =
            THERMAL_NOISE_DBM_PER_HZ + 10.0 * bandwidth_hz.log10() + self.config.noise_figure_db;
        self.config.tx_power_dbm - path_loss - noise_dbm
    }

    fn required_snr_db(vector: &TxVector) -> f64 {
        match vector.mode {
            TxMode::Ht { mcs } => {
                let base = HT_REQUIRED_SNR_DB[(mcs as usize).min(HT_REQUIRED_SNR_DB.len() - 1)];
                let streams = f64::from(vector.streams.max(1) - 1) * PER_STREAM_PENALTY_DB;
                let sgi = if vector.short_guard_interval {
                    SHORT_GI_PENALTY_DB
                } else {
                    0.0
                };
                base + streams + sgi
            }
            TxMode::Legacy { index } => {
                LEGACY_REQUIRED_SNR_DB[(index as usize).min(LEGACY_REQUIRED_SNR_DB.len() - 1)]
            }
        }
    }

    /// Probability that one attempt with `vector` is acknowledged.
    pub fn success_probability(&self, vector: &TxVector) -> f64 {
        let margin = self.snr_db(vector.channel_width) - Self::required_snr_db(vector);
        1.0 / (1.0 + (-self.config.steepness * margin).exp())
    }

    /// Draws the fate of one attempt.
    pub fn deliver(&mut self, vector: &TxVector) -> bool {
        let p = self.success_probability(vector);
        self.rng.gen_bool(p)
    }
}
