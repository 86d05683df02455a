//! The decoded-packet record schema: a sealed tagged union over
//! packet kind, with a shared metadata record, in place of a
//! dynamically-typed mapping keyed by string.

use chrono::{DateTime, Utc};

use crate::hsk::HousekeepingFrame;
use crate::magic::MagicSample;
use crate::stein::{SteinEvent, SteinHousekeeping};

/// The kind of a decoded packet, as dispatched by APID (or, for
/// headerless GSE input, by header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketKind {
    /// STEIN particle-detector event list.
    Stein,
    /// MAGIC magnetometer vector list.
    Magic,
    /// Recorded housekeeping sweep.
    HskRecorded,
    /// Recently-transmitted housekeeping sweep.
    HskRecent,
    /// Overflow packet, retained unparsed.
    Overflow,
    /// An APID outside the supported set, or a header byte that
    /// matched neither STEIN nor MAGIC.
    Unknown,
}

/// A packet's on-board real-time-clock timestamp. STEIN, HSK and
/// overflow packets carry the full `(MM,DD,HH,mm,ss,ff)` tuple; MAGIC
/// carries only `(HH,mm,ss,ff)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketTimestamp {
    /// Full six-field timestamp: month, day, hour, minute, second,
    /// centisecond.
    Full {
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        centisecond: u8,
    },
    /// Partial four-field timestamp: hour, minute, second,
    /// centisecond. Used only by MAGIC.
    Partial {
        hour: u8,
        minute: u8,
        second: u8,
        centisecond: u8,
    },
}

impl PacketTimestamp {
    /// The common `(hour, minute, second, centisecond)` suffix shared
    /// by both timestamp shapes.
    pub fn hms_cs(&self) -> (u8, u8, u8, u8) {
        match *self {
            PacketTimestamp::Full { hour, minute, second, centisecond, .. } => {
                (hour, minute, second, centisecond)
            }
            PacketTimestamp::Partial { hour, minute, second, centisecond } => {
                (hour, minute, second, centisecond)
            }
        }
    }
}

/// A small-integer quality-of-data scale where lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityCode(pub u8);

impl QualityCode {
    /// Valid data, within expected variation.
    pub const CREDIBLE: QualityCode = QualityCode(0);
    /// Valid data, with unexpected variation.
    pub const PLAUSIBLE: QualityCode = QualityCode(1);
    /// Valid data, with expected uncertainty (e.g. a repaired
    /// timestamp, no fractional seconds).
    pub const IMPRECISE: QualityCode = QualityCode(3);
    /// Valid data, with a possible data gap.
    pub const DISCONTINUITY_POSSIBLE: QualityCode = QualityCode(8);
    /// Valid data, with a certain data gap.
    pub const DISCONTINUITY: QualityCode = QualityCode(9);
    /// Incomplete: an instrument buffer overflow dropped transfers.
    pub const INCOMPLETE_BUFFER: QualityCode = QualityCode(11);
    /// The block's linear fit slope fell outside `[0.95, 1.10]`.
    pub const ALGORITHM_FAILED: QualityCode = QualityCode(17);
    /// Incomplete: the packet timestamp itself was out of range.
    pub const INCOMPLETE_BAD_TIMESTAMP: QualityCode = QualityCode(19);
    /// Corrupted beyond use.
    pub const BAD: QualityCode = QualityCode(20);
}

/// Provenance metadata the demultiplexer attaches to every packet
/// decoded from a given source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Provenance {
    /// Path (or other caller-meaningful identifier) of the source the
    /// packet was decoded from.
    pub source_path: String,
    /// Lowercase hex-encoded SHA-1 digest of the full source's bytes,
    /// computed once per source and copied into every packet.
    pub source_sha1: String,
    /// When the packet was extracted.
    pub extracted_at: DateTime<Utc>,
}

/// Kind-specific decoded payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketPayload {
    /// 198 STEIN events plus the 8-byte IIB housekeeping trailer.
    Stein {
        events: Vec<SteinEvent>,
        housekeeping: SteinHousekeeping,
    },
    /// 39 MAGIC vector samples.
    Magic { samples: Vec<MagicSample> },
    /// A recorded housekeeping sweep.
    HskRecorded(HousekeepingFrame),
    /// A recently-transmitted housekeeping sweep.
    HskRecent(HousekeepingFrame),
    /// The 62-byte overflow packet, retained unparsed.
    Overflow(Vec<u8>),
    /// An unsupported APID or header byte; raw bytes retained.
    Unknown(Vec<u8>),
}

/// A fully decoded packet, with its metadata and (once the timing
/// engine has run) per-sample absolute times and a quality tag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedPacket {
    /// 16-bit APID as read from the CCSDS primary header (or, for
    /// headerless input, the supported-set APID implied by the
    /// header byte).
    pub apid: u16,
    /// The packet's kind.
    pub kind: PacketKind,
    /// Raw CCSDS primary header bytes, empty if stripped by GSEOS.
    pub ccsds_bytes: Vec<u8>,
    /// The packet header byte (`0xAF`/`0xBE`), if this kind has one.
    pub header_byte: Option<u8>,
    /// The packet's on-board RTC timestamp, if decoding reached it.
    pub packet_timestamp: Option<PacketTimestamp>,
    /// The 13-byte transfer-frame header this packet arrived under,
    /// if known.
    pub transfer_frame_header: Option<[u8; 13]>,
    /// The kind-specific payload.
    pub payload: PacketPayload,
    /// Source file/hash/extraction-instant provenance.
    pub provenance: Provenance,
    /// Per-sample absolute times, filled in by the timing engine.
    /// Empty until the timing engine runs, or if it could not resolve
    /// a time for this packet.
    pub absolute_time: Vec<DateTime<Utc>>,
    /// Quality-of-data tag, filled in by the timing engine. Defaults
    /// to [`QualityCode::CREDIBLE`] before the timing engine runs.
    pub quality: QualityCode,
}

impl DecodedPacket {
    /// Number of samples/events this packet's payload carries (39 for
    /// MAGIC, 198 for STEIN, 0 otherwise). Used by the timing engine
    /// to size `absolute_time`.
    pub fn sample_count(&self) -> usize {
        match &self.payload {
            PacketPayload::Magic { samples } => samples.len(),
            PacketPayload::Stein { events, .. } => events.len(),
            _ => 0,
        }
    }
}
