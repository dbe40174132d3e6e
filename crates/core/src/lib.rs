//! Minstrel-HT rate and retry adaptation for 802.11n transmitters.
//!
//! A [`MinstrelHtManager`] owns the rate control state of every peer of one
//! transmitter. The MAC asks it for the [`TxVector`](phy::TxVector) of each
//! attempt and reports back how the attempt went; the manager learns which
//! rate gives the best expected throughput per peer and how many retries each
//! rate deserves.
//!
//! ```no_run
//! use minstrel_ht::phy::{ChannelWidth, HtPhyModel, MacAddr, StationCapabilities};
//! use minstrel_ht::{MinstrelHtConfig, MinstrelHtManager};
//!
//! let mut manager =
//!     MinstrelHtManager::new(Box::new(HtPhyModel::default()), MinstrelHtConfig::default())?;
//! let peer = MacAddr::from_index(1);
//! manager.set_station_capabilities(peer, StationCapabilities::ht(2, true, ChannelWidth::Mhz40, 8));
//!
//! let vector = manager.data_tx_vector(peer);
//! // ... transmit with `vector` ...
//! manager.report_data_ok(peer);
//! # Ok::<(), minstrel_ht::error::ConfigError>(())
//! ```

/// File level configuration and logger installation.
pub mod config;

pub mod error;

/// Rate change notifications.
pub mod events;

/// Minstrel for peers without HT support.
pub mod legacy;

pub mod minstrel_ht;

/// What the controller needs from the radio.
pub mod phy;

/// Deterministic time, randomness and channel model for simulations.
pub mod simulation;

/// Tracing subscriber initialization.
pub mod tracing;

#[cfg(test)]
mod test_utils;

pub use minstrel_ht::{MinstrelHtConfig, MinstrelHtManager, RateId, StationStats};
