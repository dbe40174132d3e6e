//! PHY/MAC collaborator contract.
//!
//! The rate controller never models signal propagation or frame timing
//! itself. Everything it needs to know about the radio is asked through
//! [`WifiPhy`]: ideal airtime of a frame at a given rate, nominal data rates,
//! and the MAC timing constants that bound a retry chain.
//!
//! [`HtPhyModel`] is a reference implementation using 802.11n HT-mixed-format
//! timing and ERP-OFDM legacy rates. The simulator and the tests use it;
//! drivers plug in their own.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Channel bandwidth of an HT transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChannelWidth {
    Mhz20,
    Mhz40,
}

impl ChannelWidth {
    pub fn mhz(&self) -> u16 {
        match self {
            ChannelWidth::Mhz20 => 20,
            ChannelWidth::Mhz40 => 40,
        }
    }

    pub(crate) fn is_ht40(&self) -> bool {
        matches!(self, ChannelWidth::Mhz40)
    }
}

impl fmt::Display for ChannelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

/// Hardware address identifying a remote station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Builds a locally administered address from a small integer, handy for
    /// simulations with many synthetic peers.
    pub fn from_index(index: u32) -> Self {
        let b = index.to_be_bytes();
        MacAddr([0x02, 0x00, b[0], b[1], b[2], b[3]])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// What the local transmitter is able to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyCapabilities {
    pub short_guard_interval: bool,
    pub channel_width: ChannelWidth,
    pub tx_antennas: u8,
    /// Number of modulation indices per spatial stream (MCS 0..n).
    pub supported_mcs: u8,
    /// Number of legacy (non-HT) modes, lowest rate first.
    pub legacy_modes: u8,
}

/// What a remote receiver advertised when it associated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationCapabilities {
    pub ht_supported: bool,
    pub short_guard_interval: bool,
    pub channel_width: ChannelWidth,
    pub rx_streams: u8,
    pub supported_mcs: u8,
    pub legacy_modes: u8,
}

impl StationCapabilities {
    /// A receiver that only understands legacy rates.
    pub fn legacy(legacy_modes: u8) -> Self {
        Self {
            ht_supported: false,
            short_guard_interval: false,
            channel_width: ChannelWidth::Mhz20,
            rx_streams: 1,
            supported_mcs: 0,
            legacy_modes,
        }
    }

    /// An HT receiver.
    pub fn ht(
        rx_streams: u8,
        short_guard_interval: bool,
        channel_width: ChannelWidth,
        supported_mcs: u8,
    ) -> Self {
        Self {
            ht_supported: true,
            short_guard_interval,
            channel_width,
            rx_streams,
            supported_mcs,
            legacy_modes: ERP_NUM_MODES,
        }
    }
}

/// The modulation a frame is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxMode {
    /// HT modulation and coding scheme, per spatial stream (0..8).
    Ht { mcs: u8 },
    /// Legacy mode index into the PHY's legacy rate list.
    Legacy { index: u8 },
}

/// Parameters for transmitting one frame, handed back to the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxVector {
    pub mode: TxMode,
    pub streams: u8,
    pub short_guard_interval: bool,
    pub channel_width: ChannelWidth,
    /// Retry count of the frame this vector is for.
    pub retries: u32,
}

/// Everything the rate controller consumes from the PHY and MAC.
pub trait WifiPhy: Send {
    fn capabilities(&self) -> PhyCapabilities;

    /// Ideal airtime of a `frame_len` byte frame at the given HT rate.
    fn ht_tx_duration(
        &self,
        frame_len: u32,
        mcs: u8,
        streams: u8,
        short_guard_interval: bool,
        width: ChannelWidth,
    ) -> Duration;

    /// Nominal HT data rate in bit/s.
    fn ht_data_rate(&self, mcs: u8, streams: u8, short_guard_interval: bool, width: ChannelWidth)
        -> u64;

    /// Ideal airtime of a `frame_len` byte frame at the given legacy mode.
    fn legacy_tx_duration(&self, frame_len: u32, mode: u8) -> Duration;

    /// Nominal legacy data rate in bit/s.
    fn legacy_data_rate(&self, mode: u8) -> u64;

    fn ack_timeout(&self) -> Duration;

    fn slot_time(&self) -> Duration;
}

/// Data bits per OFDM symbol for one stream, HT MCS 0-7 at 20 MHz.
const HT20_NDBPS: [u64; 8] = [26, 52, 78, 104, 156, 208, 234, 260];
/// Data bits per OFDM symbol for one stream, HT MCS 0-7 at 40 MHz.
const HT40_NDBPS: [u64; 8] = [54, 108, 162, 216, 324, 432, 486, 540];
/// Data bits per OFDM symbol for ERP-OFDM, 6 to 54 Mbit/s.
const ERP_NDBPS: [u64; 8] = [24, 36, 48, 72, 96, 144, 192, 216];

pub const ERP_NUM_MODES: u8 = ERP_NDBPS.len() as u8;

const SERVICE_BITS: u64 = 16;
const TAIL_BITS: u64 = 6;
const SYMBOL_LONG_GI_NANOS: u64 = 4_000;
const SYMBOL_SHORT_GI_NANOS: u64 = 3_600;
/// L-STF + L-LTF + L-SIG + HT-SIG + HT-STF.
const HT_MF_PREAMBLE_NANOS: u64 = 32_000;
const HT_LTF_NANOS: u64 = 4_000;
/// L-STF + L-LTF + L-SIG.
const ERP_PREAMBLE_NANOS: u64 = 20_000;

/// Reference 802.11n PHY.
#[derive(Debug, Clone)]
pub struct HtPhyModel {
    capabilities: PhyCapabilities,
    ack_timeout: Duration,
    slot_time: Duration,
}

impl Default for HtPhyModel {
    fn default() -> Self {
        Self::new(PhyCapabilities {
            short_guard_interval: true,
            channel_width: ChannelWidth::Mhz40,
            tx_antennas: 4,
            supported_mcs: HT20_NDBPS.len() as u8,
            legacy_modes: ERP_NUM_MODES,
        })
    }
}

impl HtPhyModel {
    pub fn new(capabilities: PhyCapabilities) -> Self {
        Self {
            capabilities,
            ack_timeout: Duration::from_micros(75),
            slot_time: Duration::from_micros(9),
        }
    }

    pub fn with_mac_timing(mut self, ack_timeout: Duration, slot_time: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self.slot_time = slot_time;
        self
    }

    fn ht_bits_per_symbol(mcs: u8, streams: u8, width: ChannelWidth) -> u64 {
        let table = match width {
            ChannelWidth::Mhz20 => &HT20_NDBPS,
            ChannelWidth::Mhz40 => &HT40_NDBPS,
        };
        let per_stream = table[(mcs as usize).min(table.len() - 1)];
        per_stream * u64::from(streams.max(1))
    }

    fn symbol_nanos(short_guard_interval: bool) -> u64 {
        if short_guard_interval {
            SYMBOL_SHORT_GI_NANOS
        } else {
            SYMBOL_LONG_GI_NANOS
        }
    }

    fn payload_symbols(frame_len: u32, bits_per_symbol: u64) -> u64 {
        let bits = SERVICE_BITS + 8 * u64::from(frame_len) + TAIL_BITS;
        bits.div_ceil(bits_per_symbol)
    }
}

impl WifiPhy for HtPhyModel {
    fn capabilities(&self) -> PhyCapabilities {
        self.capabilities
    }

    fn ht_tx_duration(
        &self,
        frame_len: u32,
        mcs: u8,
        streams: u8,
        short_guard_interval: bool,
        width: ChannelWidth,
    ) -> Duration {
        // Three streams still need four training fields.
        let ltfs = match streams {
            3 => 4,
            n => u64::from(n.max(1)),
        };
        let symbols =
            Self::payload_symbols(frame_len, Self::ht_bits_per_symbol(mcs, streams, width));
        Duration::from_nanos(
            HT_MF_PREAMBLE_NANOS
                + ltfs * HT_LTF_NANOS
                + symbols * Self::symbol_nanos(short_guard_interval),
        )
    }

    fn ht_data_rate(
        &self,
        mcs: u8,
        streams: u8,
        short_guard_interval: bool,
        width: ChannelWidth,
    ) -> u64 {
        Self::ht_bits_per_symbol(mcs, streams, width) * 1_000_000_000
            / Self::symbol_nanos(short_guard_interval)
    }

    fn legacy_tx_duration(&self, frame_len: u32, mode: u8) -> Duration {
        let ndbps = ERP_NDBPS[(mode as usize).min(ERP_NDBPS.len() - 1)];
        let symbols = Self::payload_symbols(frame_len, ndbps);
        Duration::from_nanos(ERP_PREAMBLE_NANOS + symbols * SYMBOL_LONG_GI_NANOS)
    }

    fn legacy_data_rate(&self, mode: u8) -> u64 {
        ERP_NDBPS[(mode as usize).min(ERP_NDBPS.len() - 1)] * 1_000_000_000
            / SYMBOL_LONG_GI_NANOS
    }

    fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    fn slot_time(&self) -> Duration {
        self.slot_time
    }
}
