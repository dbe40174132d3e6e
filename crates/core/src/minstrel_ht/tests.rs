use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ConfigError;
use crate::events::RateChange;
use crate::phy::{ChannelWidth, HtPhyModel, MacAddr, StationCapabilities, TxMode, TxVector, WifiPhy};
use crate::simulation::{TimeSource, VirtualTime};
use crate::test_utils::ContextFixture;

use super::config::{FRAME_COUNT_RESET, HIGH_PROB, SLOW_SAMPLE_SKIP_THRESHOLD};
use super::station::RateDecision;
use super::stats::retry_count_for;
use super::{GroupTable, HtStation, MinstrelHtConfig, MinstrelHtManager, RateId, StationStats};

// ============================================================================
// Link harness: manager + virtual clock + scripted delivery
// ============================================================================

/// Drives one peer through the MAC call sequence on virtual time.
struct LinkHarness {
    manager: MinstrelHtManager<VirtualTime>,
    time: VirtualTime,
    peer: MacAddr,
}

impl LinkHarness {
    fn new(capabilities: StationCapabilities) -> Self {
        Self::with_config(capabilities, MinstrelHtConfig::default().with_seed(42))
    }

    fn with_config(capabilities: StationCapabilities, config: MinstrelHtConfig) -> Self {
        let time = VirtualTime::new();
        let mut manager = MinstrelHtManager::with_time_source(
            Box::new(HtPhyModel::default()),
            config,
            time.clone(),
        )
        .unwrap();
        let peer = MacAddr::from_index(1);
        manager.set_station_capabilities(peer, capabilities);
        Self {
            manager,
            time,
            peer,
        }
    }

    fn rate_of(vector: &TxVector) -> RateId {
        let TxMode::Ht { mcs } = vector.mode else {
            panic!("expected an HT vector, got {vector:?}");
        };
        let group = GroupTable::group_id(
            vector.streams,
            vector.short_guard_interval,
            vector.channel_width,
        );
        RateId::new(group, mcs as usize)
    }

    /// Sends one frame; `deliver` decides the fate of every attempt. Returns
    /// every rate tried.
    fn send_frame(&mut self, mut deliver: impl FnMut(RateId) -> bool) -> Vec<RateId> {
        let mut tried = Vec::new();
        loop {
            let vector = self.manager.data_tx_vector(self.peer);
            let rate = Self::rate_of(&vector);
            tried.push(rate);
            if deliver(rate) {
                self.manager.report_data_ok(self.peer);
                return tried;
            }
            self.manager.report_data_failed(self.peer);
            if !self.manager.need_data_retransmission(self.peer) {
                self.manager.report_final_data_failed(self.peer);
                return tried;
            }
        }
    }

    fn snapshot(&self) -> super::HtStationStats {
        match self.manager.station_snapshot(self.peer) {
            Some(StationStats::Ht(stats)) => stats,
            other => panic!("expected an HT station, got {other:?}"),
        }
    }
}

fn single_stream_20mhz() -> StationCapabilities {
    StationCapabilities::ht(1, false, ChannelWidth::Mhz20, 8)
}

// ============================================================================
// Station-level tests
// ============================================================================

fn ht_station(fx: &mut ContextFixture, capabilities: StationCapabilities) -> HtStation {
    HtStation::new(capabilities, &mut fx.ctx()).expect("HT capable station")
}

#[test]
fn test_cold_start_returns_lowest_supported_rate() {
    let mut fx = ContextFixture::new(1);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, true, ChannelWidth::Mhz40, 8));
    assert_eq!(station.tx_rate(), RateId::new(0, 0));

    let decision = station.find_rate(&mut fx.ctx());
    assert_eq!(decision, RateDecision::ColdStart(RateId::new(0, 0)));
    assert!(!decision.notifies());
}

#[test]
fn test_supported_groups_follow_capability_intersection() {
    let mut fx = ContextFixture::new(1);
    let station = ht_station(&mut fx, StationCapabilities::ht(2, true, ChannelWidth::Mhz20, 5));
    let groups: Vec<usize> = station.supported_groups().collect();
    // 1-2 streams, both guard intervals, 20 MHz only.
    assert_eq!(groups, vec![0, 1, 4, 5]);
    assert_eq!(station.n_supported_mcs(), 5);
    assert_eq!(station.sample_table().rates(), 5);
}

#[test]
fn test_no_modulation_support_is_not_ht() {
    let mut fx = ContextFixture::new(1);
    let caps = StationCapabilities::ht(1, false, ChannelWidth::Mhz20, 0);
    assert!(HtStation::new(caps, &mut fx.ctx()).is_none());
    assert!(HtStation::new(StationCapabilities::legacy(8), &mut fx.ctx()).is_none());
}

#[test]
fn test_refresh_is_idempotent_within_interval() {
    let mut fx = ContextFixture::new(3);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    for i in 0..40 {
        station.force_tx_rate(RateId::new(0, i % 8));
        if i % 3 == 0 {
            station.report_data_failed();
            station.report_final_data_failed(&mut fx.ctx());
        } else {
            station.report_data_ok(&mut fx.ctx());
        }
    }
    fx.next_cycle();

    assert!(station.update_stats(&fx.ctx()));
    let first = station.stats();
    assert!(!station.update_stats(&fx.ctx()));
    assert_eq!(station.stats(), first);
}

#[test]
fn test_adjusted_retry_count_never_below_one() {
    let mut fx = ContextFixture::new(5);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, true, ChannelWidth::Mhz40, 8));
    let groups: Vec<usize> = station.supported_groups().collect();
    for cycle in 0..25 {
        for (n, &group) in groups.iter().enumerate() {
            for rate in 0..8 {
                station.force_tx_rate(RateId::new(group, rate));
                if (cycle + n + rate) % 4 == 0 {
                    station.report_data_failed();
                    station.report_final_data_failed(&mut fx.ctx());
                } else {
                    station.report_data_ok(&mut fx.ctx());
                }
            }
        }
        fx.next_cycle();
        station.update_stats(&fx.ctx());
        for (_, rate) in station.stats().rates {
            assert!(rate.adjusted_retry_count >= 1);
            assert!(rate.adjusted_retry_count <= rate.retry_count.max(1));
        }
    }
}

#[test]
fn test_sampling_cursor_cycles_all_columns() {
    let mut fx = ContextFixture::new(9);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    let (rates, columns) = (station.sample_table().rates(), station.sample_table().columns());

    let mut columns_seen = HashSet::new();
    let mut proposed = HashSet::new();
    for _ in 0..rates * columns {
        columns_seen.insert(station.sample_cursor(0).column);
        proposed.insert(station.next_sample());
    }
    assert_eq!(columns_seen.len(), columns);
    assert_eq!(proposed.len(), rates);
}

#[test]
fn test_sampling_only_visits_supported_groups() {
    let mut fx = ContextFixture::new(9);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, false, ChannelWidth::Mhz40, 8));
    let supported: HashSet<usize> = station.supported_groups().collect();
    assert_eq!(supported, HashSet::from([0, 1, 8, 9]));

    let start: Vec<_> = supported.iter().map(|&g| station.sample_cursor(g)).collect();
    let rounds = supported.len() * station.sample_table().rates() * station.sample_table().columns();
    let mut groups_seen = HashSet::new();
    for _ in 0..rounds {
        let group = station.sample_group();
        let sample = station.next_sample();
        assert_eq!(sample.group(), group);
        assert!(supported.contains(&sample.group()));
        groups_seen.insert(sample.group());
    }
    assert_eq!(groups_seen, supported);
    // Round robin: every group walked its whole cycle once.
    let end: Vec<_> = supported.iter().map(|&g| station.sample_cursor(g)).collect();
    assert_eq!(start, end);
}

fn at(rate: usize) -> RateId {
    RateId::new(0, rate)
}

#[test]
fn test_sample_rejects_current_best_rates() {
    let mut fx = ContextFixture::new(31);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    station.force_best_rates(at(7), at(6), at(5));
    for incumbent in [at(7), at(6), at(5)] {
        station.rate_stats_mut(incumbent).samples_skipped = 25;
        assert!(!station.accepts_sample(incumbent, &fx.groups), "{incumbent}");
    }
}

#[test]
fn test_sample_faster_than_second_best_is_accepted_unless_reliable() {
    let mut fx = ContextFixture::new(31);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    station.force_best_rates(at(7), at(2), at(1));

    assert!(station.accepts_sample(at(4), &fx.groups));
    // Already known to work: nothing to learn.
    station.rate_stats_mut(at(4)).ewma_prob = HIGH_PROB + 1;
    assert!(!station.accepts_sample(at(4), &fx.groups));
    station.rate_stats_mut(at(4)).ewma_prob = HIGH_PROB;
    assert!(station.accepts_sample(at(4), &fx.groups));
}

#[test]
fn test_sample_with_fewer_streams_beats_best_probability() {
    let mut fx = ContextFixture::new(37);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, false, ChannelWidth::Mhz20, 8));
    let two_streams = |rate| RateId::new(1, rate);
    station.force_best_rates(two_streams(7), two_streams(6), at(2));

    // Slower than the second best, faster than the best probability rate.
    assert!(station.accepts_sample(at(4), &fx.groups));
    // Slower than both.
    assert!(!station.accepts_sample(at(1), &fx.groups));

    // Same stream count as the best rate: the shortcut does not apply.
    station.force_best_rates(at(7), at(6), at(2));
    assert!(!station.accepts_sample(at(4), &fx.groups));
}

#[test]
fn test_slow_samples_need_starvation() {
    let mut fx = ContextFixture::new(41);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    station.force_best_rates(at(7), at(6), at(5));
    station.rate_stats_mut(at(3)).samples_skipped = SLOW_SAMPLE_SKIP_THRESHOLD - 1;

    let verdicts: Vec<bool> = (0..3).map(|_| station.accepts_sample(at(3), &fx.groups)).collect();
    assert_eq!(verdicts, [false, false, false]);
}

#[test]
fn test_starved_slow_samples_are_capped_per_cycle() {
    let mut fx = ContextFixture::new(41);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    station.force_best_rates(at(7), at(6), at(5));
    station.rate_stats_mut(at(3)).samples_skipped = 25;

    let verdicts: Vec<bool> = (0..3).map(|_| station.accepts_sample(at(3), &fx.groups)).collect();
    assert_eq!(verdicts, [true, true, false]);

    // A refresh opens a new allowance.
    fx.next_cycle();
    assert!(station.update_stats(&fx.ctx()));
    station.force_best_rates(at(7), at(6), at(5));
    station.rate_stats_mut(at(3)).samples_skipped = 25;
    assert!(station.accepts_sample(at(3), &fx.groups));
}

/// Calls `find_rate` until a look-around rate is issued.
fn first_sample(station: &mut HtStation, fx: &mut ContextFixture) -> RateId {
    for _ in 0..200 {
        if let RateDecision::Sample(rate) = station.find_rate(&mut fx.ctx()) {
            return rate;
        }
    }
    panic!("no sample issued");
}

#[test]
fn test_counters_reset_after_frame_count_limit() {
    let mut fx = ContextFixture::new(43);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    // Every rate but the incumbent is faster than the second best.
    station.force_best_rates(at(0), at(0), at(0));

    station.force_counters(FRAME_COUNT_RESET - 1, 0);
    first_sample(&mut station, &mut fx);
    let stats = station.stats();
    assert_eq!((stats.frame_count, stats.sample_count), (FRAME_COUNT_RESET - 1, 1));

    station.force_counters(FRAME_COUNT_RESET, 0);
    let sample = first_sample(&mut station, &mut fx);
    assert_ne!(sample, at(0));
    let stats = station.stats();
    assert_eq!((stats.frame_count, stats.sample_count), (0, 0));
    assert_eq!(stats.sample_rate, Some(sample));
}

#[test]
fn test_best_probability_after_sustained_success() {
    let mut fx = ContextFixture::new(11);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    let target = RateId::new(0, 3);

    for _ in 0..50 {
        station.force_tx_rate(target);
        station.report_data_ok(&mut fx.ctx());
        fx.next_cycle();
    }
    station.update_stats(&fx.ctx());

    let stats = station.stats();
    let rate = stats.rate(target).unwrap();
    assert!(rate.ewma_prob > HIGH_PROB, "ewma {}", rate.ewma_prob);
    assert!(rate.adjusted_retry_count <= 2);
    assert_eq!(stats.max_prob, target);
    assert_eq!(stats.max_tp, target);
}

#[test]
fn test_second_best_excludes_best_across_groups() {
    let mut fx = ContextFixture::new(13);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, false, ChannelWidth::Mhz20, 8));
    // One stream is reliable up to mcs 6, two streams up to mcs 4.
    for _ in 0..20 {
        for (group, limit) in [(0, 6), (1, 4)] {
            for rate in 0..8 {
                station.force_tx_rate(RateId::new(group, rate));
                if rate <= limit {
                    station.report_data_ok(&mut fx.ctx());
                } else {
                    station.report_data_failed();
                    station.report_final_data_failed(&mut fx.ctx());
                }
            }
        }
        fx.next_cycle();
    }
    station.update_stats(&fx.ctx());
    let stats = station.stats();

    // Equal probabilities everywhere, so airtime decides: two streams at
    // mcs 4 beat one stream at mcs 6, which beats two streams at mcs 3.
    assert_eq!(stats.max_tp, RateId::new(1, 4));
    assert_eq!(stats.max_tp2, RateId::new(0, 6));
    let tp = |id: RateId| stats.rate(id).unwrap().throughput;
    assert!(tp(stats.max_tp) > tp(stats.max_tp2));
    assert!(tp(stats.max_tp2) > tp(RateId::new(1, 3)));
}

#[test]
fn test_retry_chain_walk_matches_tiers() {
    let mut fx = ContextFixture::new(17);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    let chain = station.retry_chain();
    for long_retry in 1..=chain.total_budget() {
        let before = station.tx_rate();
        station.report_data_failed();
        let expected = chain.rate_for(long_retry).unwrap_or(before);
        assert_eq!(station.tx_rate(), expected, "long retry {long_retry}");
    }
    assert!(!station.need_data_retransmission());
}

#[test]
#[should_panic(expected = "Max retries reached")]
fn test_retry_past_chain_is_fatal() {
    let mut fx = ContextFixture::new(17);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    let total = station.retry_chain().total_budget();
    for _ in 0..=total {
        station.report_data_failed();
    }
}

#[test]
#[should_panic(expected = "Inconsistent group selected")]
fn test_inconsistent_data_rate_is_fatal() {
    let mut fx = ContextFixture::new(19);
    let mut station = ht_station(&mut fx, single_stream_20mhz());
    // Two streams on a single stream receiver.
    station.force_tx_rate(RateId::new(1, 0));
    station.data_tx_vector(&fx.groups);
}

#[test]
fn test_rts_uses_non_ht_reference_rate() {
    let mut fx = ContextFixture::new(23);
    let mut station = ht_station(&mut fx, StationCapabilities::ht(2, true, ChannelWidth::Mhz40, 8));

    // 6.5 Mbit/s -> 6 Mbit/s
    station.force_tx_rate(RateId::new(0, 0));
    assert_eq!(station.rts_tx_vector(&fx.phy).mode, TxMode::Legacy { index: 0 });
    // 19.5 Mbit/s -> 18 Mbit/s
    station.force_tx_rate(RateId::new(13, 2));
    let rts = station.rts_tx_vector(&fx.phy);
    assert_eq!(rts.mode, TxMode::Legacy { index: 3 });
    assert_eq!(rts.streams, 1);
    assert!(!rts.short_guard_interval);
    assert_eq!(rts.channel_width, ChannelWidth::Mhz20);
    // 65 Mbit/s -> 54 Mbit/s
    station.force_tx_rate(RateId::new(0, 7));
    assert_eq!(station.rts_tx_vector(&fx.phy).mode, TxMode::Legacy { index: 7 });

    station.report_rts_failed();
    station.report_rts_failed();
    assert_eq!(station.rts_tx_vector(&fx.phy).retries, 2);
    station.report_final_rts_failed();
    assert_eq!(station.rts_tx_vector(&fx.phy).retries, 0);
    assert_eq!(station.stats().err, 1);
}

#[test]
fn test_duration_table_dump_lists_supported_rates() {
    let mut fx = ContextFixture::new(29);
    let station = ht_station(&mut fx, single_stream_20mhz());
    let dump = station.duration_table_dump();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), 8);
    let mcs0 = fx.phy.ht_tx_duration(1200, 0, 1, false, ChannelWidth::Mhz20);
    assert_eq!(lines[0], format!("index(0) = {}us", mcs0.as_micros()));
}

// ============================================================================
// Manager-level tests
// ============================================================================

#[test_log::test]
fn test_selected_rates_stay_within_supported_space() {
    let caps = StationCapabilities::ht(2, true, ChannelWidth::Mhz20, 6);
    let mut link = LinkHarness::new(caps);
    let mut delivery_rng = crate::simulation::SimulationRng::new(99);

    for _ in 0..3_000 {
        let tried = link.send_frame(|rate| {
            let p = 1.0 - rate.rate() as f64 * 0.15;
            delivery_rng.gen_bool(p)
        });
        for rate in tried {
            let station = link.manager.ht_station(link.peer);
            assert!(station.is_group_supported(rate.group()), "{rate}");
            assert!(rate.rate() < station.n_supported_mcs(), "{rate}");
        }
        link.time.advance(Duration::from_millis(1));
    }
    let stats = link.snapshot();
    assert!(stats.sample_count > 0);
    assert_eq!(stats.long_retry, 0);
}

#[test]
fn test_sampling_share_tracks_look_around_rate() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    link.manager.data_tx_vector(link.peer);
    let mut samples = 0;
    let frames = 5_000;
    for _ in 0..frames {
        if link.snapshot().sample_rate.is_some() {
            samples += 1;
        }
        link.send_frame(|rate| rate.rate() <= 4);
        link.time.advance(Duration::from_millis(1));
    }
    // Sampling only starts while the share is below 10%.
    assert!(samples > 0);
    assert!(samples * 100 / frames <= 10, "sampled {samples} of {frames}");
}

#[test]
fn test_converges_to_fastest_reliable_rate() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    for _ in 0..4_000 {
        link.send_frame(|rate| rate.rate() <= 5);
        link.time.advance(Duration::from_millis(1));
    }
    let stats = link.snapshot();
    assert_eq!(stats.max_tp, RateId::new(0, 5));
    assert_eq!(stats.max_tp2, RateId::new(0, 4));
    assert_eq!(stats.rate(RateId::new(0, 7)).unwrap().throughput, 0);
}

#[test]
fn test_unknown_peer_falls_back_to_legacy() {
    let time = VirtualTime::new();
    let mut manager = MinstrelHtManager::with_time_source(
        Box::new(HtPhyModel::default()),
        MinstrelHtConfig::default().with_seed(1),
        time,
    )
    .unwrap();
    let peer = MacAddr::from_index(7);
    assert_eq!(manager.is_ht_station(peer), None);

    let vector = manager.data_tx_vector(peer);
    assert_eq!(vector.mode, TxMode::Legacy { index: 0 });
    assert_eq!(vector.streams, 1);
    assert_eq!(manager.is_ht_station(peer), Some(false));
    assert!(matches!(
        manager.station_snapshot(peer),
        Some(StationStats::Legacy(_))
    ));
}

#[test]
fn test_capabilities_ignored_after_initialization() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    let first = link.manager.data_tx_vector(link.peer);
    assert_eq!(link.manager.is_ht_station(link.peer), Some(true));

    link.manager
        .set_station_capabilities(link.peer, StationCapabilities::legacy(8));
    assert_eq!(link.manager.is_ht_station(link.peer), Some(true));
    assert_eq!(link.manager.data_tx_vector(link.peer), first);
    assert_eq!(link.manager.station_count(), 1);
}

#[test]
fn test_remove_station_forgets_state() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    link.send_frame(|_| true);
    assert!(link.manager.station_snapshot(link.peer).is_some());

    assert!(link.manager.remove_station(link.peer));
    assert!(!link.manager.remove_station(link.peer));
    assert!(link.manager.station_snapshot(link.peer).is_none());
    assert!(link.manager.sample_table_dump(link.peer).is_none());

    // Comes back as a fresh legacy peer, since its capabilities went too.
    link.manager.data_tx_vector(link.peer);
    assert_eq!(link.manager.is_ht_station(link.peer), Some(false));
}

#[test]
fn test_rate_change_notifications_carry_data_rate() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    let seen: Arc<Mutex<Vec<RateChange>>> = Arc::default();
    let sink = seen.clone();
    link.manager
        .on_rate_change(move |change| sink.lock().unwrap().push(change));

    // Initialization is a cold start and stays silent.
    link.manager.data_tx_vector(link.peer);
    assert!(seen.lock().unwrap().is_empty());

    link.send_frame(|_| true);
    let next = link.manager.data_tx_vector(link.peer);
    let events = seen.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    let TxMode::Ht { mcs } = next.mode else {
        panic!("expected HT");
    };
    let expected = link.manager.phy().ht_data_rate(
        mcs,
        next.streams,
        next.short_guard_interval,
        next.channel_width,
    );
    assert_eq!(
        events[0],
        RateChange {
            data_rate: expected,
            peer: link.peer,
        }
    );
}

#[test]
fn test_sample_notification_carries_sample_rate() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    let seen: Arc<Mutex<Vec<RateChange>>> = Arc::default();
    let sink = seen.clone();
    link.manager
        .on_rate_change(move |change| sink.lock().unwrap().push(change));

    for _ in 0..2_000 {
        link.send_frame(|_| true);
        link.time.advance(Duration::from_millis(1));
        let stats = link.snapshot();
        let Some(sample) = stats.sample_rate else {
            continue;
        };
        assert_ne!(sample, stats.max_tp);
        let expected = link.manager.phy().ht_data_rate(
            sample.rate() as u8,
            1,
            false,
            ChannelWidth::Mhz20,
        );
        let last = seen.lock().unwrap().last().cloned();
        assert_eq!(
            last,
            Some(RateChange {
                data_rate: expected,
                peer: link.peer,
            })
        );
        return;
    }
    panic!("no sample was issued");
}

#[test]
fn test_retry_budget_follows_mac_timing() {
    let ack_timeout = Duration::from_millis(1);
    let slot_time = Duration::from_micros(9);
    let phy = HtPhyModel::default().with_mac_timing(ack_timeout, slot_time);
    let mut manager = MinstrelHtManager::with_time_source(
        Box::new(phy),
        MinstrelHtConfig::default().with_seed(3),
        VirtualTime::new(),
    )
    .unwrap();
    let peer = MacAddr::from_index(1);
    manager.set_station_capabilities(peer, single_stream_20mhz());
    manager.data_tx_vector(peer);
    let Some(StationStats::Ht(slow)) = manager.station_snapshot(peer) else {
        panic!("expected an HT station");
    };

    let mut link = LinkHarness::new(single_stream_20mhz());
    link.manager.data_tx_vector(link.peer);
    let fast = link.snapshot();

    for ((id, slow_rate), (_, fast_rate)) in slow.rates.iter().zip(&fast.rates) {
        assert_eq!(
            slow_rate.retry_count,
            retry_count_for(slow_rate.perfect_tx_time, ack_timeout, slot_time),
            "{id}"
        );
        assert!(slow_rate.retry_count <= fast_rate.retry_count, "{id}");
    }
    // 188 us at mcs 7: three retries fit in 6 ms with a 1 ms ACK timeout,
    // at least four with the default 75 us.
    let mcs7 = RateId::new(0, 7);
    assert_eq!(slow.rate(mcs7).unwrap().retry_count, 3);
    assert!(fast.rate(mcs7).unwrap().retry_count >= 4);
}

#[test]
fn test_final_failure_resets_retries_and_counts_error() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    let tried = link.send_frame(|_| false);
    let budget = tried.len() as u32;
    assert!(budget >= 3);

    let stats = link.snapshot();
    assert_eq!(stats.err, 1);
    assert_eq!(stats.long_retry, 0);
    assert_eq!(stats.short_retry, 0);
    assert_eq!(link.manager.data_tx_vector(link.peer).retries, 0);
}

#[test]
fn test_dumps_for_initialized_peer() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    assert!(link.manager.sample_table_dump(link.peer).is_none());
    link.manager.data_tx_vector(link.peer);

    let table = link.manager.sample_table_dump(link.peer).unwrap();
    assert_eq!(table.lines().count(), 8);
    assert!(table.lines().all(|l| l.split('\t').count() == 10));
    let durations = link.manager.duration_table_dump(link.peer).unwrap();
    assert_eq!(durations.lines().count(), 8);
}

#[test]
fn test_same_seed_same_decisions() {
    let run = |seed: u64| {
        let mut link = LinkHarness::with_config(
            single_stream_20mhz(),
            MinstrelHtConfig::default().with_seed(seed),
        );
        let mut rates = Vec::new();
        for _ in 0..500 {
            rates.extend(link.send_frame(|rate| rate.rate() <= 3));
            link.time.advance(Duration::from_millis(1));
        }
        rates
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn test_assign_streams_reseeds() {
    let mut a = LinkHarness::with_config(
        single_stream_20mhz(),
        MinstrelHtConfig::default().with_seed(1),
    );
    let mut b = LinkHarness::with_config(
        single_stream_20mhz(),
        MinstrelHtConfig::default().with_seed(2),
    );
    a.manager.assign_streams(77);
    b.manager.assign_streams(77);
    assert_eq!(
        a.manager.sample_table_dump(a.peer),
        b.manager.sample_table_dump(b.peer)
    );
    a.manager.data_tx_vector(a.peer);
    b.manager.data_tx_vector(b.peer);
    assert_eq!(
        a.manager.sample_table_dump(a.peer),
        b.manager.sample_table_dump(b.peer)
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = MinstrelHtConfig {
        look_around_rate: 101,
        ..Default::default()
    };
    let err = MinstrelHtManager::with_time_source(
        Box::new(HtPhyModel::default()),
        config,
        VirtualTime::new(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange {
            name: "look_around_rate",
            ..
        }
    ));
}

#[test]
fn test_refresh_follows_virtual_clock() {
    let mut link = LinkHarness::new(single_stream_20mhz());
    link.send_frame(|_| true);
    let before = link.snapshot();
    // Same instant: counters move, derived values do not.
    link.send_frame(|_| true);
    let during = link.snapshot();
    let ewma = |stats: &super::HtStationStats| -> Vec<u32> {
        stats.rates.iter().map(|(_, r)| r.ewma_prob).collect()
    };
    assert_eq!(ewma(&before), ewma(&during));

    link.time.advance(link.manager.config().update_stats);
    link.send_frame(|_| true);
    let after = link.snapshot();
    assert!(after.rates.iter().any(|(_, r)| r.ewma_prob > 0));
    assert_eq!(link.manager.time_source().now(), link.manager.config().update_stats);
}
