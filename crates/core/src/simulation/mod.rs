//! Deterministic simulation support.
//!
//! The rate controller reads time through a [`TimeSource`] and draws every
//! random decision from a [`SimulationRng`]. Swapping [`RealTime`] for
//! [`VirtualTime`] and seeding the RNG makes a whole run reproducible, which
//! is what the tests and the `minstrel-sim` binary rely on.
//!
//! [`LossyChannel`] closes the loop for those runs: it decides whether a
//! frame sent with a given [`TxVector`](crate::phy::TxVector) reaches a peer
//! at some distance.

mod channel;
mod rng;
mod time;

pub use channel::{ChannelConfig, LossyChannel};
pub use rng::SimulationRng;
pub use time::{RealTime, TimeSource, VirtualTime};
