//! Error and diagnostic types returned by this crate.
//!
//! A hard `Err` is reserved for conditions that leave no useful
//! partial result. Non-fatal conditions (ASM mismatch, unsupported
//! APID, a bad packet timestamp) are instead represented as data -- a
//! [`Warning`] pushed to a caller-visible list, or a quality tag on
//! the decoded record -- so that partial science data is never
//! discarded.

use std::io;

/// Errors that can occur while decoding a single packet's payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A packet buffer was neither 512 nor 518 bytes.
    #[error("packet buffer has size {actual}, expected 512 or 518")]
    SizeMismatch {
        /// The size actually observed.
        actual: usize,
    },

    /// A STEIN event's EVCODE fell outside the 2-bit domain `0..=3`.
    ///
    /// This can't actually happen (EVCODE is extracted as exactly 2
    /// bits), but the case is represented so event decoding always
    /// returns a `Result` rather than asserting.
    #[error("invalid STEIN event code: {0}")]
    InvalidEventCode(u8),

    /// An EVCODE-3 event's ADD sub-discriminator fell outside `0..=1`.
    #[error("invalid STEIN ADD bit: {0}")]
    InvalidAdd(u8),
}

/// Errors that can occur while reconstructing absolute sample times.
#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    /// A MAGIC sample's `mt` field selected a temperature reading
    /// (`mt=1`), which CINEMA's flight software never populates, or an
    /// instrument mode outside the four defined modes was observed.
    #[error("unsupported MAGIC sample mode/mt combination: mode={mode}, mt={mt}")]
    Unsupported {
        /// The offending instrument mode.
        mode: u8,
        /// The offending `mt` (mag-vs-temperature) bit.
        mt: u8,
    },
}

/// Top-level error type unifying I/O failures with decode/timing
/// failures, for callers driving the demultiplexer over a byte
/// source.
#[derive(Debug, thiserror::Error)]
pub enum CinemaError {
    /// The underlying byte source failed. Fatal to the current file;
    /// the caller may continue with the next one.
    #[error("I/O error reading telemetry source: {0}")]
    Io(#[from] io::Error),

    /// A packet failed to decode in a way that leaves no usable
    /// payload at all (most decode problems downgrade to a [`Warning`]
    /// or a quality tag instead of reaching here).
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The timing engine could not interpolate a sample time.
    #[error("timing error: {0}")]
    Timing(#[from] TimingError),
}

/// A non-fatal diagnostic raised during demultiplexing or decoding.
/// These never abort decoding; they accumulate for the caller to
/// inspect or log as it sees fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    /// The frame's Attached Synchronization Marker did not match
    /// `0x1ACFFC1D`. The frame is retained and decoding continues.
    AsmMismatch {
        /// The ASM value actually observed.
        observed: u32,
    },

    /// A packet slot carried an APID outside the supported set; its
    /// raw bytes are retained under [`crate::packet::PacketKind::Unknown`].
    UnsupportedApid {
        /// The unrecognized APID.
        apid: u16,
    },

    /// A packet buffer was not 512 or 518 bytes; the packet becomes
    /// [`crate::packet::PacketKind::Unknown`].
    SizeMismatch {
        /// The size actually observed.
        actual: usize,
    },

    /// A headerless GSE packet's first content byte didn't match a
    /// known header (`0xAF`/`0xBE`); the packet becomes
    /// [`crate::packet::PacketKind::Unknown`].
    InvalidHeader {
        /// The unrecognized header byte.
        byte: u8,
    },

    /// A STEIN event had an invalid EVCODE or ADD bit; the offending
    /// event is dropped from the packet's event list but the packet
    /// survives.
    InvalidStein {
        /// Index of the offending event within the packet's 198 events.
        event_index: usize,
    },
}
