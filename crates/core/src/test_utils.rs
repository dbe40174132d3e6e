//! Shared fixtures for unit tests that drive a single station directly,
//! without going through the manager.

use std::time::Duration;

use crate::minstrel_ht::{GroupTable, MinstrelHtConfig, StationContext};
use crate::phy::HtPhyModel;
use crate::simulation::SimulationRng;

/// Owns everything a [`StationContext`] borrows, plus a hand-driven clock.
pub(crate) struct ContextFixture {
    pub phy: HtPhyModel,
    pub groups: GroupTable,
    pub config: MinstrelHtConfig,
    pub rng: SimulationRng,
    pub now: Duration,
}

impl ContextFixture {
    pub fn new(seed: u64) -> Self {
        let config = MinstrelHtConfig::default();
        let phy = HtPhyModel::default();
        let groups = GroupTable::build(&phy, config.frame_length);
        Self {
            phy,
            groups,
            config,
            rng: SimulationRng::new(seed),
            now: Duration::ZERO,
        }
    }

    pub fn ctx(&mut self) -> StationContext<'_> {
        StationContext {
            phy: &self.phy,
            groups: &self.groups,
            config: &self.config,
            rng: &mut self.rng,
            now: self.now,
        }
    }

    /// Moves the clock past the next refresh deadline.
    pub fn next_cycle(&mut self) {
        self.now += self.config.update_stats;
    }
}
