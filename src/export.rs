//! The export adapter boundary: an abstract sink the core pushes
//! decoded, timed packets into, plus a reference ASCII formatter for
//! MAGIC data following the fixed-width `timestamp MODE SENSOR M Bx
//! By Bz TEMP HH mm ss ff PACKET_CNT` column layout ground operators
//! expect.
//!
//! CDF and pickle export, directory walking, and decompression are
//! the caller's concern; this module only defines the contract and
//! one worked example.

use std::io::{self, Write};

use crate::apid;
use crate::magic::{Reading, Sensor};
use crate::packet::{DecodedPacket, PacketKind, PacketPayload};
use crate::timing::mode_tag;

/// Placeholder written for a sample's timestamp column when
/// `absolute_time` holds no instant for it (the timing engine never
/// ran, or failed for this packet).
pub const MISSING_TIMESTAMP_PLACEHOLDER: &str = "YYYY-MM-DDTHH:MM:SS.mmmmmm";

/// A destination for exported records. The core only ever calls
/// [`ExportSink::write_line`]; how lines reach disk, a socket, or an
/// in-memory buffer is entirely up to the implementation.
pub trait ExportSink {
    /// Write one already-terminated line (including its line ending).
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Adapts any [`Write`] implementor (a file, a `Vec<u8>`, a socket) to
/// [`ExportSink`].
pub struct WriterSink<W: Write>(pub W);

impl<W: Write> ExportSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.0.write_all(line.as_bytes())
    }
}

fn format_timestamp(instant: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    match instant {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        None => MISSING_TIMESTAMP_PLACEHOLDER.to_string(),
    }
}

/// CCSDS sequence count embedded in a packet's primary header, used
/// as the `PACKET_CNT` export column. `0` if the packet carries no
/// CCSDS header (e.g. a headerless GSE packet).
fn packet_cnt(ccsds_bytes: &[u8]) -> u16 {
    if ccsds_bytes.len() < 4 {
        return 0;
    }
    (((ccsds_bytes[2] & 0b0011_1111) as u16) << 8) | ccsds_bytes[3] as u16
}

fn sensor_tag(sensor: Sensor) -> u8 {
    match sensor {
        Sensor::Outboard => 0,
        Sensor::Inboard => 1,
    }
}

const MAGIC_HEADER: &[&str] = &[
    "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%\r\n",
    "% CINEMA[1] MAGIC Event List\r\n",
    "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%\r\n",
];

/// Write every MAGIC sample in `packets` as a fixed-width ASCII table,
/// following the `timestamp_ISO8601 MODE SENSOR M Bx By Bz TEMP HH mm
/// ss ff PACKET_CNT` column contract. Non-MAGIC packets are skipped.
pub fn write_magic_ascii(packets: &[DecodedPacket], sink: &mut impl ExportSink) -> io::Result<()> {
    for line in MAGIC_HEADER {
        sink.write_line(line)?;
    }
    sink.write_line(&format!("% {MISSING_TIMESTAMP_PLACEHOLDER} MODE SENSOR M Bx By Bz TEMP HH mm ss ff PACKET_CNT\r\n"))?;

    for packet in packets {
        if packet.kind != PacketKind::Magic {
            continue;
        }
        let samples = match &packet.payload {
            PacketPayload::Magic { samples } => samples,
            _ => continue,
        };
        let (hour, minute, second, centisecond) =
            packet.packet_timestamp.as_ref().map(|ts| ts.hms_cs()).unwrap_or((0, 0, 0, 0));
        let cnt = packet_cnt(&packet.ccsds_bytes);

        for (j, sample) in samples.iter().enumerate() {
            let timestamp = format_timestamp(packet.absolute_time.get(j));
            let mode = mode_tag(sample.mode);
            let sensor = sensor_tag(sample.sensor);
            let mt = sample.mt();
            let (bx, by, bz, temp) = match sample.reading {
                Reading::Vector { bx, by, bz, temp } => (bx, by, bz, temp),
                Reading::Temperature { temp_a, temp_b } => (temp_a, 0, temp_b, 0),
            };
            sink.write_line(&format!(
                "{timestamp}{mode:2}{sensor:3}{mt:3}{bx:9}{by:9}{bz:9}{temp:9}{hour:3}{minute:3}{second:3}{centisecond:3}{cnt:6}\r\n"
            ))?;
        }
    }
    Ok(())
}

/// Write one overflow packet's raw bytes as a hex dump, for the cases
/// an operator wants to inspect a dropped buffer by hand. Overflow
/// packets carry no timestamp or sample structure to format as a
/// table.
pub fn write_overflow_hex(packet: &DecodedPacket, sink: &mut impl ExportSink) -> io::Result<()> {
    if packet.kind != PacketKind::Overflow {
        return Ok(());
    }
    let PacketPayload::Overflow(bytes) = &packet.payload else { return Ok(()) };
    let apid_matches = packet.apid == apid::APID_OVERFLOW;
    debug_assert!(apid_matches, "overflow packet carried an unexpected APID");
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
    sink.write_line(&format!("% overflow packet ({} bytes): {hex}\r\n", bytes.len()))
}
