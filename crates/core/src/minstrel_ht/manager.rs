//! Station arena and MAC-facing entry points.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::ConfigError;
use crate::events::{RateChange, RateChangeListeners};
use crate::legacy::{LegacyStation, LegacyStationStats};
use crate::phy::{MacAddr, StationCapabilities, TxVector, WifiPhy};
use crate::simulation::{RealTime, SimulationRng, TimeSource};

use super::config::MinstrelHtConfig;
use super::groups::GroupTable;
use super::rate_id::RateId;
use super::station::{HtStation, HtStationStats, RateDecision, StationContext};

/// Rate control state of one peer, decided once at first use.
#[derive(Debug, Clone)]
enum Station {
    Ht(Box<HtStation>),
    Legacy(Box<LegacyStation>),
}

impl Station {
    fn init(peer: MacAddr, capabilities: StationCapabilities, ctx: &mut StationContext<'_>) -> Self {
        match HtStation::new(capabilities, ctx) {
            Some(station) => {
                tracing::debug!(
                    peer = %peer,
                    mcs = station.n_supported_mcs(),
                    rate = %station.tx_rate(),
                    "Initialized HT station"
                );
                Station::Ht(Box::new(station))
            }
            None => {
                tracing::debug!(peer = %peer, "Peer is not HT capable, using legacy rate control");
                Station::Legacy(Box::new(LegacyStation::new(capabilities, ctx)))
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StationRecord {
    capabilities: StationCapabilities,
    /// `None` until the first callback that needs a rate decision.
    station: Option<Station>,
}

enum Selection {
    Ht(RateDecision<RateId>),
    Legacy(RateDecision<usize>),
}

/// Snapshot of one peer's rate control state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StationStats {
    Ht(HtStationStats),
    Legacy(LegacyStationStats),
}

/// Minstrel-HT rate manager for one transmitter.
///
/// Owns the group table built from the PHY and one record per peer. All MAC
/// callbacks for a peer go through here; the first one initializes the peer
/// as HT or legacy for good.
pub struct MinstrelHtManager<T: TimeSource = RealTime> {
    phy: Box<dyn WifiPhy>,
    groups: GroupTable,
    config: MinstrelHtConfig,
    time: T,
    rng: SimulationRng,
    stations: HashMap<MacAddr, StationRecord>,
    listeners: RateChangeListeners,
}

impl MinstrelHtManager<RealTime> {
    pub fn new(phy: Box<dyn WifiPhy>, config: MinstrelHtConfig) -> Result<Self, ConfigError> {
        Self::with_time_source(phy, config, RealTime::new())
    }
}

impl<T: TimeSource> MinstrelHtManager<T> {
    pub fn with_time_source(
        phy: Box<dyn WifiPhy>,
        config: MinstrelHtConfig,
        time: T,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let groups = GroupTable::build(phy.as_ref(), config.frame_length);
        let rng = match config.seed {
            Some(seed) => SimulationRng::new(seed),
            None => SimulationRng::from_entropy(),
        };
        tracing::debug!(
            groups = groups.len(),
            seed = rng.seed(),
            update_stats_ms = config.update_stats.as_millis() as u64,
            "Created Minstrel-HT manager"
        );
        Ok(Self {
            phy,
            groups,
            config,
            time,
            rng,
            stations: HashMap::new(),
            listeners: RateChangeListeners::default(),
        })
    }

    pub fn config(&self) -> &MinstrelHtConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    pub fn phy(&self) -> &dyn WifiPhy {
        self.phy.as_ref()
    }

    pub fn time_source(&self) -> &T {
        &self.time
    }

    /// Reseeds the random decisions of every station.
    pub fn assign_streams(&mut self, seed: u64) {
        self.rng = SimulationRng::new(seed);
    }

    pub fn on_rate_change(&mut self, listener: impl Fn(RateChange) + Send + 'static) {
        self.listeners.subscribe(listener);
    }

    /// Records what a peer advertised. Ignored once the peer is initialized.
    pub fn set_station_capabilities(&mut self, peer: MacAddr, capabilities: StationCapabilities) {
        match self.stations.get_mut(&peer) {
            Some(record) if record.station.is_some() => {
                tracing::warn!(peer = %peer, "Station already initialized, ignoring capabilities");
            }
            Some(record) => record.capabilities = capabilities,
            None => {
                self.stations.insert(
                    peer,
                    StationRecord {
                        capabilities,
                        station: None,
                    },
                );
            }
        }
    }

    pub fn remove_station(&mut self, peer: MacAddr) -> bool {
        let removed = self.stations.remove(&peer).is_some();
        if removed {
            tracing::debug!(peer = %peer, "Removed station");
        }
        removed
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Whether the peer is driven by the HT engine; `None` until initialized.
    pub fn is_ht_station(&self, peer: MacAddr) -> Option<bool> {
        match self.stations.get(&peer)?.station.as_ref()? {
            Station::Ht(_) => Some(true),
            Station::Legacy(_) => Some(false),
        }
    }

    fn with_station<R>(
        &mut self,
        peer: MacAddr,
        f: impl FnOnce(&mut Station, &mut StationContext<'_>) -> R,
    ) -> R {
        let default_caps = StationCapabilities::legacy(self.phy.capabilities().legacy_modes);
        let mut ctx = StationContext {
            phy: self.phy.as_ref(),
            groups: &self.groups,
            config: &self.config,
            rng: &mut self.rng,
            now: self.time.now(),
        };
        let record = self.stations.entry(peer).or_insert_with(|| StationRecord {
            capabilities: default_caps,
            station: None,
        });
        let capabilities = record.capabilities;
        let station = record
            .station
            .get_or_insert_with(|| Station::init(peer, capabilities, &mut ctx));
        f(station, &mut ctx)
    }

    fn notify(&self, peer: MacAddr, selection: Selection) {
        let data_rate = match selection {
            Selection::Ht(decision) if decision.notifies() => {
                let rate = decision.rate();
                let group = self.groups.get(rate.group());
                self.phy.ht_data_rate(
                    rate.rate() as u8,
                    group.streams,
                    group.short_guard_interval,
                    group.channel_width,
                )
            }
            Selection::Legacy(decision) if decision.notifies() => {
                self.phy.legacy_data_rate(decision.rate() as u8)
            }
            _ => return,
        };
        self.listeners.emit(RateChange { data_rate, peer });
    }

    /// Transmission parameters for the next DATA attempt to `peer`.
    ///
    /// # Panics
    ///
    /// When the chosen HT rate does not fit the peer's capabilities.
    pub fn data_tx_vector(&mut self, peer: MacAddr) -> TxVector {
        self.with_station(peer, |station, ctx| match station {
            Station::Ht(s) => s.data_tx_vector(ctx.groups),
            Station::Legacy(s) => s.data_tx_vector(),
        })
    }

    pub fn rts_tx_vector(&mut self, peer: MacAddr) -> TxVector {
        self.with_station(peer, |station, ctx| match station {
            Station::Ht(s) => s.rts_tx_vector(ctx.phy),
            Station::Legacy(s) => s.rts_tx_vector(),
        })
    }

    pub fn report_rx_ok(&mut self, peer: MacAddr) {
        tracing::trace!(peer = %peer, "Rx ok");
    }

    pub fn report_rts_ok(&mut self, peer: MacAddr) {
        tracing::trace!(peer = %peer, "RTS ok");
    }

    pub fn report_rts_failed(&mut self, peer: MacAddr) {
        self.with_station(peer, |station, _| match station {
            Station::Ht(s) => s.report_rts_failed(),
            Station::Legacy(s) => s.report_rts_failed(),
        })
    }

    pub fn report_final_rts_failed(&mut self, peer: MacAddr) {
        tracing::trace!(peer = %peer, "Final RTS failed");
        self.with_station(peer, |station, _| match station {
            Station::Ht(s) => s.report_final_rts_failed(),
            Station::Legacy(s) => s.report_final_rts_failed(),
        })
    }

    /// A DATA attempt went unacknowledged; picks the rate of the next attempt.
    ///
    /// # Panics
    ///
    /// When the frame already used up its whole retry chain and the MAC kept
    /// retrying instead of reporting a final failure.
    pub fn report_data_failed(&mut self, peer: MacAddr) {
        self.with_station(peer, |station, _| match station {
            Station::Ht(s) => s.report_data_failed(),
            Station::Legacy(s) => s.report_data_failed(),
        })
    }

    pub fn report_data_ok(&mut self, peer: MacAddr) {
        let selection = self.with_station(peer, |station, ctx| match station {
            Station::Ht(s) => Selection::Ht(s.report_data_ok(ctx)),
            Station::Legacy(s) => Selection::Legacy(s.report_data_ok(ctx)),
        });
        self.notify(peer, selection);
    }

    pub fn report_final_data_failed(&mut self, peer: MacAddr) {
        let selection = self.with_station(peer, |station, ctx| match station {
            Station::Ht(s) => Selection::Ht(s.report_final_data_failed(ctx)),
            Station::Legacy(s) => Selection::Legacy(s.report_final_data_failed(ctx)),
        });
        self.notify(peer, selection);
    }

    /// Whether the retry chain allows another attempt of the current frame.
    pub fn need_data_retransmission(&mut self, peer: MacAddr) -> bool {
        self.with_station(peer, |station, _| match station {
            Station::Ht(s) => s.need_data_retransmission(),
            Station::Legacy(s) => s.need_data_retransmission(),
        })
    }

    fn initialized(&self, peer: MacAddr) -> Option<&Station> {
        self.stations.get(&peer)?.station.as_ref()
    }

    /// Sample table of an initialized peer, one tab separated line per row.
    pub fn sample_table_dump(&self, peer: MacAddr) -> Option<String> {
        Some(match self.initialized(peer)? {
            Station::Ht(s) => s.sample_table().dump(),
            Station::Legacy(s) => s.sample_table().dump(),
        })
    }

    /// Ideal airtime of every rate of an initialized peer.
    pub fn duration_table_dump(&self, peer: MacAddr) -> Option<String> {
        Some(match self.initialized(peer)? {
            Station::Ht(s) => s.duration_table_dump(),
            Station::Legacy(s) => s.duration_table_dump(),
        })
    }

    pub fn station_snapshot(&self, peer: MacAddr) -> Option<StationStats> {
        Some(match self.initialized(peer)? {
            Station::Ht(s) => StationStats::Ht(s.stats()),
            Station::Legacy(s) => StationStats::Legacy(s.stats()),
        })
    }

    #[cfg(test)]
    pub(crate) fn ht_station(&mut self, peer: MacAddr) -> &mut HtStation {
        self.with_station(peer, |_, _| ());
        match self.stations.get_mut(&peer).and_then(|r| r.station.as_mut()) {
            Some(Station::Ht(s)) => s.as_mut(),
            _ => panic!("{peer} is not an HT station"),
        }
    }
}

impl<T: TimeSource> std::fmt::Debug for MinstrelHtManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinstrelHtManager")
            .field("config", &self.config)
            .field("rng", &self.rng)
            .field("stations", &self.stations.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}
