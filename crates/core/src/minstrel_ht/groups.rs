//! Rate group table.
//!
//! A group is one (streams, guard interval, channel width) combination. The
//! table is built once when the transmitter is attached and caches the ideal
//! airtime of the reference frame for every modulation index of every group.

use std::time::Duration;

use crate::phy::{ChannelWidth, PhyCapabilities, StationCapabilities, WifiPhy};

use super::config::{MAX_GROUP_RATES, MAX_SUPPORTED_STREAMS, N_GROUPS};

/// One group of HT rates sharing stream count, guard interval and width.
#[derive(Debug, Clone)]
pub struct McsGroup {
    pub streams: u8,
    pub short_guard_interval: bool,
    pub channel_width: ChannelWidth,
    /// (modulation index, ideal duration) pairs, in registration order.
    tx_times: Vec<(u8, Duration)>,
}

impl McsGroup {
    /// Whether both ends of the link can use this group.
    pub(crate) fn is_supported(&self, tx: &PhyCapabilities, rx: &StationCapabilities) -> bool {
        let tx_ok = (tx.short_guard_interval || !self.short_guard_interval)
            && tx.channel_width >= self.channel_width
            && tx.tx_antennas >= self.streams;
        let rx_ok = (rx.short_guard_interval || !self.short_guard_interval)
            && rx.channel_width >= self.channel_width
            && rx.rx_streams >= self.streams;
        tx_ok && rx_ok
    }
}

/// Static catalog of every HT group, owned by the manager.
#[derive(Debug, Clone)]
pub struct GroupTable {
    groups: Vec<McsGroup>,
}

impl GroupTable {
    /// Group index of a (streams, guard interval, width) combination.
    pub fn group_id(streams: u8, short_guard_interval: bool, width: ChannelWidth) -> usize {
        let streams_total = MAX_SUPPORTED_STREAMS as usize;
        2 * streams_total * usize::from(width.is_ht40())
            + streams_total * usize::from(short_guard_interval)
            + streams as usize
            - 1
    }

    /// Builds every group and registers the ideal airtime of `frame_len` bytes
    /// for each modulation index the transmitter supports.
    pub fn build(phy: &dyn WifiPhy, frame_len: u32) -> Self {
        let mcs_count = (phy.capabilities().supported_mcs as usize).min(MAX_GROUP_RATES) as u8;
        let mut slots: Vec<Option<McsGroup>> = vec![None; N_GROUPS];
        for streams in 1..=MAX_SUPPORTED_STREAMS {
            for short_guard_interval in [false, true] {
                for width in [ChannelWidth::Mhz20, ChannelWidth::Mhz40] {
                    let tx_times = (0..mcs_count)
                        .map(|mcs| {
                            let duration = phy.ht_tx_duration(
                                frame_len,
                                mcs,
                                streams,
                                short_guard_interval,
                                width,
                            );
                            (mcs, duration)
                        })
                        .collect();
                    let id = Self::group_id(streams, short_guard_interval, width);
                    tracing::debug!(
                        group = id,
                        streams,
                        sgi = short_guard_interval,
                        %width,
                        "Initialized group"
                    );
                    slots[id] = Some(McsGroup {
                        streams,
                        short_guard_interval,
                        channel_width: width,
                        tx_times,
                    });
                }
            }
        }
        Self {
            groups: slots.into_iter().flatten().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, group: usize) -> &McsGroup {
        &self.groups[group]
    }

    pub fn iter(&self) -> impl Iterator<Item = &McsGroup> {
        self.groups.iter()
    }

    /// Ideal airtime of the reference frame at `mcs` in `group`.
    ///
    /// # Panics
    ///
    /// When `mcs` was never registered for the group.
    pub fn ideal_duration(&self, group: usize, mcs: u8) -> Duration {
        self.groups[group]
            .tx_times
            .iter()
            .find(|(m, _)| *m == mcs)
            .map(|(_, d)| *d)
            .unwrap_or_else(|| panic!("no tx time registered for mcs {mcs} in group {group}"))
    }
}
