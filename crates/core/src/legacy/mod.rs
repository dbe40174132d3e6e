//! Minstrel for receivers without HT support.
//!
//! Same contract as the HT engine (pick a rate for the next frame, learn from
//! per-attempt outcomes) over a flat list of legacy modes instead of the
//! group x modulation space:
//!
//! - One statistics entry per legacy mode, refreshed on the same timer and with
//!   the same arithmetic as the HT table.
//! - Look-around candidates come from a single-cursor sample table.
//! - A candidate slower than the best rate is only tried once it has gone
//!   unsampled for a while, and is then placed second in the retry chain
//!   rather than first.

mod controller;

pub use controller::{LegacyStation, LegacyStationStats};
