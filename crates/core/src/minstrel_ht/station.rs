//! Per-station Minstrel-HT state: statistics table, refresh cycle, rate
//! selection and the outcome handlers driven by the MAC.

use std::time::Duration;

use serde::Serialize;

use crate::phy::{ChannelWidth, StationCapabilities, TxMode, TxVector, WifiPhy};
use crate::simulation::SimulationRng;

use super::config::{
    MinstrelHtConfig, FRAME_COUNT_RESET, HIGH_PROB, MAX_GROUP_RATES, MAX_SLOW_SAMPLES,
    SLOW_SAMPLE_SKIP_THRESHOLD,
};
use super::groups::GroupTable;
use super::rate_id::RateId;
use super::retry::{RetryChain, RetryTier};
use super::sample::{SampleCursor, SampleTable};
use super::stats::{retry_count_for, RateStats};

/// Collaborators a station borrows from its manager for one callback.
pub(crate) struct StationContext<'a> {
    pub phy: &'a dyn WifiPhy,
    pub groups: &'a GroupTable,
    pub config: &'a MinstrelHtConfig,
    pub rng: &'a mut SimulationRng,
    pub now: Duration,
}

/// Outcome of a rate selection for a new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RateDecision<R> {
    /// Nothing was ever sent: the initial best rate, without notification.
    ColdStart(R),
    /// A look-around rate was picked for this frame.
    Sample(R),
    /// The best throughput rate.
    Best(R),
}

impl<R: Copy> RateDecision<R> {
    pub fn rate(&self) -> R {
        match self {
            RateDecision::ColdStart(r) | RateDecision::Sample(r) | RateDecision::Best(r) => *r,
        }
    }

    /// Whether listeners hear about this decision.
    pub fn notifies(&self) -> bool {
        !matches!(self, RateDecision::ColdStart(_))
    }
}

#[derive(Debug, Clone)]
struct GroupStats {
    supported: bool,
    /// One entry per supported modulation index; empty when unsupported.
    rates: Vec<RateStats>,
    cursor: SampleCursor,
    max_tp: RateId,
    max_tp2: RateId,
    max_prob: RateId,
}

impl GroupStats {
    fn unsupported(group: usize) -> Self {
        let base = RateId::new(group, 0);
        Self {
            supported: false,
            rates: Vec::new(),
            cursor: SampleCursor::default(),
            max_tp: base,
            max_tp2: base,
            max_prob: base,
        }
    }

    /// Best throughput, second best throughput (never the best one) and
    /// best probability rate of this group. Ties keep the lowest index.
    fn select_best(&mut self, group: usize) {
        let (mut max_tp, mut best_tp) = (0, 0);
        let (mut max_prob, mut best_prob) = (0, 0);
        for (i, rate) in self.rates.iter().enumerate() {
            if best_tp < rate.throughput {
                max_tp = i;
                best_tp = rate.throughput;
            }
            if best_prob < rate.ewma_prob {
                max_prob = i;
                best_prob = rate.ewma_prob;
            }
        }

        let (mut max_tp2, mut second_tp) = (0, 0);
        for (i, rate) in self.rates.iter().enumerate() {
            if i != max_tp && second_tp < rate.throughput {
                max_tp2 = i;
                second_tp = rate.throughput;
            }
        }

        self.max_tp = RateId::new(group, max_tp);
        self.max_tp2 = RateId::new(group, max_tp2);
        self.max_prob = RateId::new(group, max_prob);
    }
}

/// Minstrel-HT state for one HT capable receiver.
#[derive(Debug, Clone)]
pub struct HtStation {
    capabilities: StationCapabilities,
    groups: Vec<GroupStats>,
    sample_table: SampleTable,
    sample_group: usize,
    n_supported_mcs: usize,
    next_stats_update: Duration,
    max_tp: RateId,
    max_tp2: RateId,
    max_prob: RateId,
    frame_count: u32,
    sample_count: u32,
    is_sampling: bool,
    sample_rate: RateId,
    num_samples_slow: u32,
    short_retry: u32,
    long_retry: u32,
    err: u32,
    tx_rate: RateId,
}

impl HtStation {
    /// Builds the station tables and seeds the first transmit rate.
    ///
    /// Returns `None` when the receiver cannot be served by any HT group, in
    /// which case it belongs to the legacy strategy.
    pub(crate) fn new(
        capabilities: StationCapabilities,
        ctx: &mut StationContext<'_>,
    ) -> Option<Self> {
        let tx_caps = ctx.phy.capabilities();
        let n_supported_mcs = capabilities
            .supported_mcs
            .min(tx_caps.supported_mcs)
            .min(MAX_GROUP_RATES as u8) as usize;
        if !capabilities.ht_supported || n_supported_mcs == 0 {
            return None;
        }

        let sample_table =
            SampleTable::generate(n_supported_mcs, ctx.config.sample_columns, ctx.rng);
        let (ack_timeout, slot_time) = (ctx.phy.ack_timeout(), ctx.phy.slot_time());

        let mut groups = Vec::with_capacity(ctx.groups.len());
        for (id, group) in ctx.groups.iter().enumerate() {
            if !group.is_supported(&tx_caps, &capabilities) {
                groups.push(GroupStats::unsupported(id));
                continue;
            }
            tracing::debug!(
                group = id,
                streams = group.streams,
                sgi = group.short_guard_interval,
                width = %group.channel_width,
                "Group supported by station"
            );
            let rates = (0..n_supported_mcs)
                .map(|mcs| {
                    let tx_time = ctx.groups.ideal_duration(id, mcs as u8);
                    RateStats::new(tx_time, retry_count_for(tx_time, ack_timeout, slot_time))
                })
                .collect();
            groups.push(GroupStats {
                supported: true,
                rates,
                ..GroupStats::unsupported(id)
            });
        }

        let lowest = groups.iter().position(|g| g.supported)?;
        let base = RateId::new(lowest, 0);
        let mut station = Self {
            capabilities,
            groups,
            sample_table,
            sample_group: 0,
            n_supported_mcs,
            next_stats_update: ctx.now,
            max_tp: base,
            max_tp2: base,
            max_prob: base,
            frame_count: 0,
            sample_count: 0,
            is_sampling: false,
            sample_rate: base,
            num_samples_slow: 0,
            short_retry: 0,
            long_retry: 0,
            err: 0,
            tx_rate: base,
        };
        station.set_next_sample();
        station.update_stats(ctx);
        station.tx_rate = station.find_rate(ctx).rate();
        Some(station)
    }

    pub fn tx_rate(&self) -> RateId {
        self.tx_rate
    }

    pub fn capabilities(&self) -> &StationCapabilities {
        &self.capabilities
    }

    pub fn n_supported_mcs(&self) -> usize {
        self.n_supported_mcs
    }

    pub fn is_group_supported(&self, group: usize) -> bool {
        self.groups.get(group).is_some_and(|g| g.supported)
    }

    pub fn supported_groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.supported)
            .map(|(id, _)| id)
    }

    pub fn sample_table(&self) -> &SampleTable {
        &self.sample_table
    }

    pub fn sample_cursor(&self, group: usize) -> SampleCursor {
        self.groups[group].cursor
    }

    pub fn sample_group(&self) -> usize {
        self.sample_group
    }

    /// # Panics
    ///
    /// When `id` belongs to a group this station does not support.
    pub fn rate_stats(&self, id: RateId) -> &RateStats {
        &self.groups[id.group()].rates[id.rate()]
    }

    pub(crate) fn rate_stats_mut(&mut self, id: RateId) -> &mut RateStats {
        &mut self.groups[id.group()].rates[id.rate()]
    }

    fn reset_retries(&mut self) {
        self.short_retry = 0;
        self.long_retry = 0;
    }

    /// Folds the running cycle into every rate and recomputes the best rates.
    ///
    /// Runs at most once per `update_stats` interval; returns whether it did.
    pub(crate) fn update_stats(&mut self, ctx: &StationContext<'_>) -> bool {
        if ctx.now < self.next_stats_update {
            return false;
        }
        self.next_stats_update = ctx.now + ctx.config.update_stats;
        self.num_samples_slow = 0;

        for (id, group) in self.groups.iter_mut().enumerate() {
            if !group.supported {
                continue;
            }
            for rate in &mut group.rates {
                rate.refresh(ctx.config.ewma_level);
            }
            group.select_best(id);
        }

        self.select_best_overall();

        let streams = |id: RateId| ctx.groups.get(id.group()).streams;
        if self.rate_stats(self.max_tp).throughput > self.rate_stats(self.tx_rate).throughput
            && streams(self.max_tp) >= streams(self.tx_rate)
        {
            self.tx_rate = self.max_tp;
        }

        tracing::debug!(
            max_tp = %self.max_tp,
            max_tp2 = %self.max_tp2,
            max_prob = %self.max_prob,
            tx_rate = %self.tx_rate,
            "Refreshed rate statistics"
        );
        true
    }

    fn select_best_overall(&mut self) {
        let supported: Vec<&GroupStats> = self.groups.iter().filter(|g| g.supported).collect();
        let Some(lowest) = supported.first() else {
            return;
        };
        let base = RateId::new(lowest.max_tp.group(), 0);
        let stats = |id: RateId| &self.groups[id.group()].rates[id.rate()];

        let (mut max_tp, mut best_tp) = (base, 0);
        let (mut max_prob, mut best_prob) = (base, 0);
        for group in &supported {
            let tp = stats(group.max_tp).throughput;
            if best_tp < tp {
                max_tp = group.max_tp;
                best_tp = tp;
            }
            let prob = stats(group.max_prob).ewma_prob;
            if best_prob < prob {
                max_prob = group.max_prob;
                best_prob = prob;
            }
        }

        let (mut max_tp2, mut second_tp) = (base, 0);
        for group in &supported {
            for candidate in [group.max_tp, group.max_tp2] {
                let tp = stats(candidate).throughput;
                if candidate != max_tp && second_tp < tp {
                    max_tp2 = candidate;
                    second_tp = tp;
                }
            }
        }

        self.max_tp = max_tp;
        self.max_tp2 = max_tp2;
        self.max_prob = max_prob;
    }

    /// Advances the sampling position: next supported group, then that
    /// group's cursor.
    pub(crate) fn set_next_sample(&mut self) {
        loop {
            self.sample_group = (self.sample_group + 1) % self.groups.len();
            if self.groups[self.sample_group].supported {
                break;
            }
        }
        let (rates, columns) = (self.sample_table.rates(), self.sample_table.columns());
        self.groups[self.sample_group].cursor.advance(rates, columns);
    }

    /// Rate under the current sampling position; moves the position on.
    pub(crate) fn next_sample(&mut self) -> RateId {
        let group = self.sample_group;
        let cursor = self.groups[group].cursor;
        let rate = self.sample_table.get(cursor.index, cursor.column);
        self.set_next_sample();
        RateId::new(group, rate)
    }

    /// Whether a proposed look-around rate is worth a frame. Counts slow
    /// candidates against the per-cycle allowance.
    pub(crate) fn accepts_sample(&mut self, sample: RateId, groups: &GroupTable) -> bool {
        if sample == self.max_tp || sample == self.max_tp2 || sample == self.max_prob {
            return false;
        }
        let (ewma_prob, tx_time, skipped) = {
            let stats = self.rate_stats(sample);
            (stats.ewma_prob, stats.perfect_tx_time, stats.samples_skipped)
        };
        if ewma_prob > HIGH_PROB {
            return false;
        }

        let sample_streams = groups.get(sample.group()).streams;
        let max_tp_streams = groups.get(self.max_tp.group()).streams;
        if tx_time < self.rate_stats(self.max_tp2).perfect_tx_time
            || (sample_streams < max_tp_streams
                && tx_time < self.rate_stats(self.max_prob).perfect_tx_time)
        {
            return true;
        }

        self.num_samples_slow += 1;
        skipped >= SLOW_SAMPLE_SKIP_THRESHOLD && self.num_samples_slow <= MAX_SLOW_SAMPLES
    }

    /// Picks the rate for a new frame, sampling a look-around rate when the
    /// sampling share is below target and the coin says so.
    pub(crate) fn find_rate(&mut self, ctx: &mut StationContext<'_>) -> RateDecision<RateId> {
        let total = self.sample_count + self.frame_count;
        if total == 0 {
            return RateDecision::ColdStart(self.max_tp);
        }

        let coin = ctx.rng.coin_flip();
        if coin && 100 * self.sample_count / total < ctx.config.look_around_rate {
            let sample = self.next_sample();
            if self.accepts_sample(sample, ctx.groups) {
                self.sample_count += 1;
                self.is_sampling = true;
                if self.frame_count >= FRAME_COUNT_RESET {
                    self.sample_count = 0;
                    self.frame_count = 0;
                }
                self.sample_rate = sample;
                tracing::trace!(rate = %sample, "Sampling look-around rate");
                return RateDecision::Sample(sample);
            }
        }

        tracing::trace!(rate = %self.max_tp, "Using best throughput rate");
        RateDecision::Best(self.max_tp)
    }

    /// Fallback tiers for the frame in flight.
    pub fn retry_chain(&self) -> RetryChain<RateId> {
        let tier = |rate: RateId| RetryTier::new(rate, self.rate_stats(rate).adjusted_retry_count);
        if self.is_sampling {
            RetryChain::new([tier(self.sample_rate), tier(self.max_tp), tier(self.max_prob)])
        } else {
            RetryChain::new([tier(self.max_tp), tier(self.max_tp2), tier(self.max_prob)])
        }
    }

    pub(crate) fn need_data_retransmission(&self) -> bool {
        let chain = self.retry_chain();
        let allowed = chain.allows_retransmission(self.long_retry);
        tracing::trace!(
            long_retry = self.long_retry,
            max_retries = chain.total_budget(),
            allowed,
            "Retransmission check"
        );
        allowed
    }

    pub(crate) fn report_rts_failed(&mut self) {
        self.short_retry += 1;
    }

    pub(crate) fn report_final_rts_failed(&mut self) {
        self.reset_retries();
        self.err += 1;
    }

    /// Charges the failed attempt and moves to the rate of the next attempt.
    ///
    /// The MAC's last failure report of a frame lands exactly on the total
    /// budget and is only logged.
    ///
    /// # Panics
    ///
    /// When called again after the retry chain was exhausted without the
    /// retry counters being reset by a final outcome.
    pub(crate) fn report_data_failed(&mut self) {
        self.long_retry += 1;
        let rate = self.tx_rate;
        self.rate_stats_mut(rate).record_failure();

        let chain = self.retry_chain();
        match chain.rate_for(self.long_retry) {
            Some(next) => {
                tracing::trace!(
                    failed = %rate,
                    next = %next,
                    long_retry = self.long_retry,
                    "Data failed"
                );
                self.tx_rate = next;
            }
            None => {
                assert!(
                    self.long_retry <= chain.total_budget(),
                    "Max retries reached and long retry count not cleared: {} > {}",
                    self.long_retry,
                    chain.total_budget()
                );
                tracing::trace!(failed = %rate, long_retry = self.long_retry, "Retry chain exhausted");
            }
        }
    }

    pub(crate) fn report_data_ok(&mut self, ctx: &mut StationContext<'_>) -> RateDecision<RateId> {
        self.is_sampling = false;
        let rate = self.tx_rate;
        self.rate_stats_mut(rate).record_success();
        self.reset_retries();
        self.frame_count += 1;
        self.update_stats(ctx);
        let decision = self.find_rate(ctx);
        self.tx_rate = decision.rate();
        decision
    }

    pub(crate) fn report_final_data_failed(
        &mut self,
        ctx: &mut StationContext<'_>,
    ) -> RateDecision<RateId> {
        self.is_sampling = false;
        self.reset_retries();
        self.err += 1;
        self.update_stats(ctx);
        let decision = self.find_rate(ctx);
        self.tx_rate = decision.rate();
        decision
    }

    /// # Panics
    ///
    /// When the group of the current rate exceeds what the receiver supports.
    pub(crate) fn data_tx_vector(&self, groups: &GroupTable) -> TxVector {
        let group = groups.get(self.tx_rate.group());
        let caps = &self.capabilities;
        assert!(
            !(group.short_guard_interval && !caps.short_guard_interval)
                && group.channel_width <= caps.channel_width
                && group.streams <= caps.rx_streams,
            "Inconsistent group selected: ({}, {}, {}), station capabilities: ({}, {}, {})",
            group.streams,
            group.short_guard_interval,
            group.channel_width,
            caps.rx_streams,
            caps.short_guard_interval,
            caps.channel_width,
        );
        TxVector {
            mode: TxMode::Ht {
                mcs: self.tx_rate.rate() as u8,
            },
            streams: group.streams,
            short_guard_interval: group.short_guard_interval,
            channel_width: group.channel_width,
            retries: self.long_retry,
        }
    }

    /// RTS goes out as a non-HT frame at the highest legacy rate not above the
    /// non-HT reference rate of the current HT rate.
    pub(crate) fn rts_tx_vector(&self, phy: &dyn WifiPhy) -> TxVector {
        let reference = phy.ht_data_rate(
            self.tx_rate.rate() as u8,
            1,
            false,
            ChannelWidth::Mhz20,
        );
        let modes = self.capabilities.legacy_modes.min(phy.capabilities().legacy_modes);
        let index = (0..modes)
            .rev()
            .find(|&mode| phy.legacy_data_rate(mode) <= reference)
            .unwrap_or(0);
        TxVector {
            mode: TxMode::Legacy { index },
            streams: 1,
            short_guard_interval: false,
            channel_width: self.capabilities.channel_width.min(ChannelWidth::Mhz20),
            retries: self.short_retry,
        }
    }

    /// `index(i) = <µs>` for every rate of every supported group.
    pub fn duration_table_dump(&self) -> String {
        let mut out = String::new();
        for group in self.groups.iter().filter(|g| g.supported) {
            for (i, rate) in group.rates.iter().enumerate() {
                out.push_str(&format!(
                    "index({i}) = {}us\n",
                    rate.perfect_tx_time.as_micros()
                ));
            }
        }
        out
    }

    pub fn stats(&self) -> HtStationStats {
        let rates = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.supported)
            .flat_map(|(group, g)| {
                g.rates
                    .iter()
                    .enumerate()
                    .map(move |(i, r)| (RateId::new(group, i), r.clone()))
            })
            .collect();
        HtStationStats {
            tx_rate: self.tx_rate,
            max_tp: self.max_tp,
            max_tp2: self.max_tp2,
            max_prob: self.max_prob,
            sample_rate: self.is_sampling.then_some(self.sample_rate),
            frame_count: self.frame_count,
            sample_count: self.sample_count,
            short_retry: self.short_retry,
            long_retry: self.long_retry,
            err: self.err,
            supported_mcs: self.n_supported_mcs,
            rates,
        }
    }

    #[cfg(test)]
    pub(crate) fn force_tx_rate(&mut self, rate: RateId) {
        self.tx_rate = rate;
    }

    #[cfg(test)]
    pub(crate) fn force_best_rates(&mut self, max_tp: RateId, max_tp2: RateId, max_prob: RateId) {
        self.max_tp = max_tp;
        self.max_tp2 = max_tp2;
        self.max_prob = max_prob;
    }

    #[cfg(test)]
    pub(crate) fn force_counters(&mut self, frame_count: u32, sample_count: u32) {
        self.frame_count = frame_count;
        self.sample_count = sample_count;
    }
}

/// Snapshot of an HT station for monitoring and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtStationStats {
    pub tx_rate: RateId,
    pub max_tp: RateId,
    pub max_tp2: RateId,
    pub max_prob: RateId,
    /// Rate being sampled by the frame in flight, if any.
    pub sample_rate: Option<RateId>,
    pub frame_count: u32,
    pub sample_count: u32,
    pub short_retry: u32,
    pub long_retry: u32,
    /// Frames abandoned after exhausting their retries.
    pub err: u32,
    pub supported_mcs: usize,
    /// Statistics of every rate of every supported group.
    pub rates: Vec<(RateId, RateStats)>,
}

impl HtStationStats {
    pub fn rate(&self, id: RateId) -> Option<&RateStats> {
        self.rates.iter().find(|(r, _)| *r == id).map(|(_, s)| s)
    }
}
