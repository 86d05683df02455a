//! # `cinema-telemetry`
//!
//! A sans-I/O decoder and timestamp-reconstruction engine for the
//! CINEMA spacecraft telemetry downlink: two instruments (the STEIN
//! particle detector and the MAGIC magnetometer) plus housekeeping,
//! multiplexed together into 1289-byte master transfer frames.
//!
//! Like the ITM/DWT decoder this crate started from, the core here
//! does no I/O and makes no blocking calls: it is a set of pure
//! functions over byte buffers and packet lists. Byte input is the
//! caller's concern -- a pre-read buffer, a memory-mapped file, a
//! transparently-decompressed stream -- and so is walking source
//! directories, progress reporting, and persisting extraction
//! metadata: none of that lives here. What the caller gets back is
//! fully decoded, time-stamped packets and a trail of non-fatal
//! [`error::Warning`]s.
//!
//! Two stages make up the core:
//!
//! - [`demux::decode_source`] splits a telemetry source into master
//!   frames, each into two packet slots plus an overflow packet, and
//!   dispatches every slot to the matching decoder
//!   ([`stein`], [`magic`], [`hsk`]) by APID (see [`apid`]).
//! - [`timing::run_magic_timing`] classifies each decoded MAGIC
//!   packet's timestamp quality, segments the stream into trusted
//!   blocks, fits the on-board RTC against the stable 128 Hz cycle
//!   counter, and interpolates a per-sample absolute time.
//!
//! Usage is simple:
//! ```
//! use cinema_telemetry::demux;
//! use cinema_telemetry::timing;
//!
//! // or a std::fs::File, or anything else read fully into memory.
//! let source: &[u8] = &[];
//! let mut output = demux::decode_source(source, "example.dat");
//! let report = timing::run_magic_timing(&mut output.packets, 2023, 6, 15);
//! let _ = report.quality_array;
//! ```
//!
//! Decoded, timed packets are handed to an [`export::ExportSink`] the
//! caller implements; CDF/pickle export and on-disk persistence are
//! not this crate's concern.

pub mod apid;
pub mod demux;
pub mod error;
pub mod export;
pub mod hsk;
pub mod magic;
pub mod outlier;
pub mod packet;
pub mod reader;
pub mod stein;
pub mod timestamp;
pub mod timing;

pub use demux::DecoderOptions;
pub use error::{CinemaError, DecodeError, TimingError, Warning};
pub use packet::{DecodedPacket, PacketKind, PacketPayload, PacketTimestamp, Provenance, QualityCode};
