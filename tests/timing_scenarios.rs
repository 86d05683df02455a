//! Black-box scenarios over the MAGIC timing engine, mirroring the
//! hand-built fixtures covering a midnight rollover, a
//! dropped transfer, and a bad timestamp that must not break block
//! segmentation unless the instrument mode also changed.

use chrono::Utc;

use cinema_telemetry::magic::{InstrumentMode, MagicSample, Reading, Sensor};
use cinema_telemetry::packet::{
    DecodedPacket, PacketKind, PacketPayload, PacketTimestamp, Provenance, QualityCode,
};
use cinema_telemetry::timing::run_magic_timing;

fn vector_sample(mode: InstrumentMode) -> MagicSample {
    MagicSample { mode, sensor: Sensor::Outboard, reading: Reading::Vector { bx: 0, by: 0, bz: 0, temp: 0 } }
}

fn magic_packet(mode: InstrumentMode, hour: u8, minute: u8, second: u8, centisecond: u8) -> DecodedPacket {
    DecodedPacket {
        apid: cinema_telemetry::apid::APID_MAGIC,
        kind: PacketKind::Magic,
        ccsds_bytes: Vec::new(),
        header_byte: Some(cinema_telemetry::apid::HEADER_MAGIC),
        packet_timestamp: Some(PacketTimestamp::Partial { hour, minute, second, centisecond }),
        transfer_frame_header: None,
        payload: PacketPayload::Magic { samples: vec![vector_sample(mode)] },
        provenance: Provenance {
            source_path: "scenario.bin".to_string(),
            source_sha1: "0".repeat(40),
            extracted_at: Utc::now(),
        },
        absolute_time: Vec::new(),
        quality: QualityCode::CREDIBLE,
    }
}

/// A midnight rollover across three packets,
/// all science mode. `rollover_cnt` should advance once, at the third
/// packet, keeping all three in one trusted block with a slope near
/// 1.0.
#[test]
fn midnight_rollover_keeps_one_trusted_block() {
    let mut packets = vec![
        magic_packet(InstrumentMode::ScienceA, 23, 59, 55, 0),
        magic_packet(InstrumentMode::ScienceA, 23, 59, 59, 90),
        magic_packet(InstrumentMode::ScienceA, 0, 0, 4, 85),
    ];

    let report = run_magic_timing(&mut packets, 2023, 6, 15);

    // No packet degraded past the block threshold: every packet stays
    // CREDIBLE/PLAUSIBLE and the run never splits into more than one
    // block.
    for packet in &packets {
        assert!(packet.quality.0 <= 7, "packet quality {:?} broke the block", packet.quality);
    }
    assert_eq!(report.quality_array.len(), 6);
    assert_eq!(*report.quality_array.last().unwrap(), 20, "sentinel must always be 20");
    for packet in &packets {
        assert!(!packet.absolute_time.is_empty());
    }
}

/// One dropped transfer in the middle of an
/// otherwise-regular science-mode stream. The dropped packet is
/// tagged QoD=3 but the block is not split.
#[test]
fn dropped_frame_is_tagged_without_splitting_block() {
    // ScienceA's nominal per-packet increment is 39*(16/128) = 4.875s.
    // Centisecond-quantized deltas of 4.88s / 9.76s / 4.88s land well
    // within the 0.1s jitter/dropped-ratio tolerance of the ideal
    // 1x/2x/1x cadence the scenario describes.
    let mut packets = vec![
        magic_packet(InstrumentMode::ScienceA, 10, 0, 0, 0),
        magic_packet(InstrumentMode::ScienceA, 10, 0, 4, 88),
        magic_packet(InstrumentMode::ScienceA, 10, 0, 14, 64),
        magic_packet(InstrumentMode::ScienceA, 10, 0, 19, 52),
    ];

    run_magic_timing(&mut packets, 2023, 6, 15);

    assert_eq!(packets[0].quality, QualityCode::CREDIBLE);
    assert_eq!(packets[1].quality, QualityCode::CREDIBLE);
    assert_eq!(packets[2].quality, QualityCode::IMPRECISE, "dropped transfer must be tagged QoD=3");
    assert_eq!(packets[3].quality, QualityCode::CREDIBLE);
}

/// A packet with an out-of-range timestamp is
/// tagged QoD=19 (incomplete/bad timestamp) without forcing a mode-
/// change-style QoD=9 boundary on its neighbors.
#[test]
fn bad_timestamp_is_tagged_without_mode_change_boundary() {
    let mut packets = vec![
        magic_packet(InstrumentMode::ScienceA, 10, 0, 0, 0),
        magic_packet(InstrumentMode::ScienceA, 25, 0, 0, 0), // HH=25 is out of range
        magic_packet(InstrumentMode::ScienceA, 10, 0, 9, 75),
    ];

    let report = run_magic_timing(&mut packets, 2023, 6, 15);

    assert_eq!(packets[1].quality, QualityCode::INCOMPLETE_BAD_TIMESTAMP);
    // The boundaries flanking the bad packet are plain 0: no mode
    // change occurred, so no QoD=9 boundary should appear.
    assert_eq!(report.quality_array[1], 0);
    assert_eq!(report.quality_array[3], 0);
}

/// The final quality-array entry is always the bad-sentinel value.
#[test]
fn quality_array_sentinel_is_always_bad() {
    let mut packets = vec![magic_packet(InstrumentMode::Attitude, 12, 0, 0, 0)];
    let report = run_magic_timing(&mut packets, 2023, 1, 1);
    assert_eq!(*report.quality_array.last().unwrap(), 20);
}
