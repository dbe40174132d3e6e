//! Legacy Minstrel station.

use std::time::Duration;

use serde::Serialize;

use crate::minstrel_ht::{
    retry_count_for, RateDecision, RateStats, RetryChain, RetryTier, SampleCursor, SampleTable,
    StationContext, FRAME_COUNT_RESET, HIGH_PROB, SLOW_SAMPLE_SKIP_THRESHOLD,
};
use crate::phy::{ChannelWidth, StationCapabilities, TxMode, TxVector};

/// Minstrel state for one legacy receiver. Rates are legacy mode indices.
#[derive(Debug, Clone)]
pub struct LegacyStation {
    capabilities: StationCapabilities,
    rates: Vec<RateStats>,
    sample_table: SampleTable,
    cursor: SampleCursor,
    next_stats_update: Duration,
    max_tp: usize,
    max_tp2: usize,
    max_prob: usize,
    packet_count: u32,
    sample_count: u32,
    is_sampling: bool,
    sample_rate: usize,
    /// The sample in flight is slower than the best rate.
    sample_rate_slower: bool,
    short_retry: u32,
    long_retry: u32,
    err: u32,
    tx_rate: usize,
}

impl LegacyStation {
    pub(crate) fn new(capabilities: StationCapabilities, ctx: &mut StationContext<'_>) -> Self {
        let modes = capabilities
            .legacy_modes
            .min(ctx.phy.capabilities().legacy_modes)
            .max(1);
        let (ack_timeout, slot_time) = (ctx.phy.ack_timeout(), ctx.phy.slot_time());
        let rates = (0..modes)
            .map(|mode| {
                let tx_time = ctx.phy.legacy_tx_duration(ctx.config.frame_length, mode);
                RateStats::new(tx_time, retry_count_for(tx_time, ack_timeout, slot_time))
            })
            .collect();
        let sample_table = SampleTable::generate(modes as usize, ctx.config.sample_columns, ctx.rng);
        tracing::debug!(modes, "Initialized legacy station");

        let mut station = Self {
            capabilities,
            rates,
            sample_table,
            cursor: SampleCursor::default(),
            next_stats_update: ctx.now,
            max_tp: 0,
            max_tp2: 0,
            max_prob: 0,
            packet_count: 0,
            sample_count: 0,
            is_sampling: false,
            sample_rate: 0,
            sample_rate_slower: false,
            short_retry: 0,
            long_retry: 0,
            err: 0,
            tx_rate: 0,
        };
        station.update_stats(ctx);
        station.tx_rate = station.find_rate(ctx).rate();
        station
    }

    pub fn tx_rate(&self) -> usize {
        self.tx_rate
    }

    pub fn modes(&self) -> usize {
        self.rates.len()
    }

    pub fn rate_stats(&self, mode: usize) -> &RateStats {
        &self.rates[mode]
    }

    pub fn sample_table(&self) -> &SampleTable {
        &self.sample_table
    }

    fn reset_retries(&mut self) {
        self.short_retry = 0;
        self.long_retry = 0;
    }

    pub(crate) fn update_stats(&mut self, ctx: &StationContext<'_>) -> bool {
        if ctx.now < self.next_stats_update {
            return false;
        }
        self.next_stats_update = ctx.now + ctx.config.update_stats;

        let (mut max_tp, mut best_tp) = (0, 0);
        let (mut max_prob, mut best_prob) = (0, 0);
        for (i, rate) in self.rates.iter_mut().enumerate() {
            rate.refresh(ctx.config.ewma_level);
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
        self.max_tp = max_tp;
        self.max_tp2 = max_tp2;
        self.max_prob = max_prob;

        tracing::debug!(max_tp, max_tp2, max_prob, "Refreshed legacy rate statistics");
        true
    }

    fn next_sample(&mut self) -> usize {
        let mode = self.sample_table.get(self.cursor.index, self.cursor.column);
        self.cursor
            .advance(self.sample_table.rates(), self.sample_table.columns());
        mode
    }

    pub(crate) fn find_rate(&mut self, ctx: &mut StationContext<'_>) -> RateDecision<usize> {
        let total = self.sample_count + self.packet_count;
        if total == 0 {
            return RateDecision::ColdStart(self.max_tp);
        }

        let coin = ctx.rng.coin_flip();
        if coin && 100 * self.sample_count / total < ctx.config.look_around_rate {
            let sample = self.next_sample();
            let stats = &self.rates[sample];
            let incumbent =
                sample == self.max_tp || sample == self.max_tp2 || sample == self.max_prob;
            let slower = stats.perfect_tx_time > self.rates[self.max_tp].perfect_tx_time;
            let starved = stats.samples_skipped >= SLOW_SAMPLE_SKIP_THRESHOLD;
            if !incumbent && stats.ewma_prob <= HIGH_PROB && (!slower || starved) {
                self.sample_count += 1;
                self.is_sampling = true;
                self.sample_rate_slower = slower;
                if self.packet_count >= FRAME_COUNT_RESET {
                    self.sample_count = 0;
                    self.packet_count = 0;
                }
                self.sample_rate = sample;
                tracing::trace!(mode = sample, slower, "Sampling legacy rate");
                return RateDecision::Sample(sample);
            }
        }

        RateDecision::Best(self.max_tp)
    }

    pub fn retry_chain(&self) -> RetryChain<usize> {
        let tier = |mode: usize| RetryTier::new(mode, self.rates[mode].adjusted_retry_count);
        match (self.is_sampling, self.sample_rate_slower) {
            (false, _) => {
                RetryChain::new([tier(self.max_tp), tier(self.max_tp2), tier(self.max_prob)])
            }
            (true, false) => {
                RetryChain::new([tier(self.sample_rate), tier(self.max_tp), tier(self.max_prob)])
            }
            (true, true) => {
                RetryChain::new([tier(self.max_tp), tier(self.sample_rate), tier(self.max_prob)])
            }
        }
    }

    pub(crate) fn need_data_retransmission(&self) -> bool {
        self.retry_chain().allows_retransmission(self.long_retry)
    }

    pub(crate) fn report_rts_failed(&mut self) {
        self.short_retry += 1;
    }

    pub(crate) fn report_final_rts_failed(&mut self) {
        self.reset_retries();
        self.err += 1;
    }

    /// # Panics
    ///
    /// When called again after the retry chain was exhausted.
    pub(crate) fn report_data_failed(&mut self) {
        self.long_retry += 1;
        self.rates[self.tx_rate].record_failure();

        let chain = self.retry_chain();
        match chain.rate_for(self.long_retry) {
            Some(next) => self.tx_rate = next,
            None => assert!(
                self.long_retry <= chain.total_budget(),
                "Max retries reached and long retry count not cleared: {} > {}",
                self.long_retry,
                chain.total_budget()
            ),
        }
    }

    pub(crate) fn report_data_ok(&mut self, ctx: &mut StationContext<'_>) -> RateDecision<usize> {
        self.is_sampling = false;
        self.sample_rate_slower = false;
        self.rates[self.tx_rate].record_success();
        self.reset_retries();
        self.packet_count += 1;
        self.update_stats(ctx);
        let decision = self.find_rate(ctx);
        self.tx_rate = decision.rate();
        decision
    }

    pub(crate) fn report_final_data_failed(
        &mut self,
        ctx: &mut StationContext<'_>,
    ) -> RateDecision<usize> {
        self.is_sampling = false;
        self.sample_rate_slower = false;
        self.reset_retries();
        self.err += 1;
        self.update_stats(ctx);
        let decision = self.find_rate(ctx);
        self.tx_rate = decision.rate();
        decision
    }

    pub(crate) fn data_tx_vector(&self) -> TxVector {
        TxVector {
            mode: TxMode::Legacy {
                index: self.tx_rate as u8,
            },
            streams: 1,
            short_guard_interval: false,
            channel_width: ChannelWidth::Mhz20,
            retries: self.long_retry,
        }
    }

    /// RTS always uses the most robust mode.
    pub(crate) fn rts_tx_vector(&self) -> TxVector {
        TxVector {
            mode: TxMode::Legacy { index: 0 },
            streams: 1,
            short_guard_interval: false,
            channel_width: ChannelWidth::Mhz20,
            retries: self.short_retry,
        }
    }

    pub fn duration_table_dump(&self) -> String {
        self.rates
            .iter()
            .enumerate()
            .map(|(i, r)| format!("index({i}) = {}us\n", r.perfect_tx_time.as_micros()))
            .collect()
    }

    pub fn capabilities(&self) -> &StationCapabilities {
        &self.capabilities
    }

    pub fn stats(&self) -> LegacyStationStats {
        LegacyStationStats {
            tx_rate: self.tx_rate,
            max_tp: self.max_tp,
            max_tp2: self.max_tp2,
            max_prob: self.max_prob,
            sample_rate: self.is_sampling.then_some(self.sample_rate),
            packet_count: self.packet_count,
            sample_count: self.sample_count,
            short_retry: self.short_retry,
            long_retry: self.long_retry,
            err: self.err,
            rates: self.rates.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_tx_rate(&mut self, mode: usize) {
        assert!(mode < self.rates.len());
        self.tx_rate = mode;
    }
}

/// Snapshot of a legacy station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegacyStationStats {
    pub tx_rate: usize,
    pub max_tp: usize,
    pub max_tp2: usize,
    pub max_prob: usize,
    pub sample_rate: Option<usize>,
    pub packet_count: u32,
    pub sample_count: u32,
    pub short_retry: u32,
    pub long_retry: u32,
    pub err: u32,
    /// Indexed by legacy mode.
    pub rates: Vec<RateStats>,
}
