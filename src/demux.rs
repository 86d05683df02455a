//! Master-frame demultiplexer: splits a 1289-byte CCSDS/SMEX transfer
//! frame into its transfer-frame header and two 518-byte packet slots,
//! dispatches each slot to the matching decoder by APID, and attaches
//! source provenance to every packet produced.
//!
//! Also offers [`decode_standalone_packet`] for the headerless-GSE
//! dispatch rule (a lone 512- or 518-byte packet with no surrounding
//! master frame), following the same APID/header-byte logic.

use chrono::Utc;
use sha1::{Digest, Sha1};

use crate::apid::{self, ASM};
use crate::error::{DecodeError, Warning};
use crate::hsk::{self, HousekeepingFrame, FAST_HSK_LEN, SLOW_HSK_FRAME_LEN, SLOW_HSK_LEN};
use crate::magic::{self, SUBFRAME_LEN as MAGIC_SUBFRAME_LEN};
use crate::packet::{DecodedPacket, PacketKind, PacketPayload, PacketTimestamp, Provenance, QualityCode};
use crate::reader::{be_uint, ByteReader};
use crate::stein::{self, HOUSEKEEPING_LEN as STEIN_HOUSEKEEPING_LEN, SUBFRAME_LEN as STEIN_SUBFRAME_LEN};

/// Size in bytes of one master transfer frame.
pub const MASTER_FRAME_LEN: usize = 1289;

/// Cumulative byte offsets of the master frame's fields: SMEX header,
/// ASM, transfer-frame header, packet 1, packet 2, overflow packet,
/// OCF, Reed-Solomon region.
const OFFSETS: [usize; 9] = [0, 10, 14, 27, 545, 1063, 1125, 1129, 1289];

/// Result of decoding an entire telemetry source: every packet
/// produced, plus every non-fatal diagnostic raised along the way.
#[derive(Debug, Clone, Default)]
pub struct DemuxOutput {
    pub packets: Vec<DecodedPacket>,
    pub warnings: Vec<Warning>,
}

/// Caller-tunable decode behavior for standalone (headerless-GSE)
/// packets. Every field defaults to autodetection, matching
/// `original_source/cinema_unpack_v0_8_1.py`'s `parse_frame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Overrides whether a 6-byte CCSDS primary header is present at
    /// the start of a standalone packet. `None` infers it from the
    /// buffer's size (518 bytes with a header, 512 without), which is
    /// the right default for every known GSE dump; set this only when
    /// a caller's source is known to violate that convention.
    pub ccsds_present: Option<bool>,
}

fn hex_sha1(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_full_timestamp(bytes: &[u8]) -> PacketTimestamp {
    PacketTimestamp::Full {
        month: bytes[0],
        day: bytes[1],
        hour: bytes[2],
        minute: bytes[3],
        second: bytes[4],
        centisecond: bytes[5],
    }
}

fn read_partial_timestamp(bytes: &[u8]) -> PacketTimestamp {
    PacketTimestamp::Partial { hour: bytes[0], minute: bytes[1], second: bytes[2], centisecond: bytes[3] }
}

fn decode_stein_body(
    reader: &mut ByteReader<'_>,
    warnings: &mut Vec<Warning>,
) -> Result<(PacketTimestamp, PacketPayload), DecodeError> {
    let ts = read_full_timestamp(reader.read_slice(6)?);
    let subframe: [u8; STEIN_SUBFRAME_LEN] =
        reader.read_slice(STEIN_SUBFRAME_LEN)?.try_into().expect("length checked by read_slice");
    let hk_bytes: [u8; STEIN_HOUSEKEEPING_LEN] =
        reader.read_slice(STEIN_HOUSEKEEPING_LEN)?.try_into().expect("length checked by read_slice");
    let events = stein::decode_events(&subframe, |event_index| {
        warnings.push(Warning::InvalidStein { event_index });
    });
    let housekeeping = stein::SteinHousekeeping::from_bytes(&hk_bytes);
    Ok((ts, PacketPayload::Stein { events, housekeeping }))
}

fn decode_magic_body(reader: &mut ByteReader<'_>) -> Result<(PacketTimestamp, PacketPayload), DecodeError> {
    let ts = read_partial_timestamp(reader.read_slice(4)?);
    let subframe: [u8; MAGIC_SUBFRAME_LEN] =
        reader.read_slice(MAGIC_SUBFRAME_LEN)?.try_into().expect("length checked by read_slice");
    let samples = magic::decode_samples(&subframe);
    Ok((ts, PacketPayload::Magic { samples }))
}

fn decode_hsk_body(reader: &mut ByteReader<'_>) -> Result<(PacketTimestamp, HousekeepingFrame), DecodeError> {
    let ts = read_full_timestamp(reader.read_slice(6)?);
    let slow_frame = reader.read_slice(SLOW_HSK_FRAME_LEN)?;
    let slow_bytes: [u8; SLOW_HSK_LEN] = slow_frame[..SLOW_HSK_LEN].try_into().expect("sliced to SLOW_HSK_LEN");
    let fast_bytes: [u8; FAST_HSK_LEN] =
        reader.read_slice(FAST_HSK_LEN)?.try_into().expect("length checked by read_slice");
    let frame = HousekeepingFrame { slow: hsk::decode_slow(&slow_bytes), fast: hsk::decode_fast(&fast_bytes) };
    Ok((ts, frame))
}

fn unknown_packet(
    apid: u16,
    ccsds_bytes: Vec<u8>,
    header_byte: Option<u8>,
    tf_header: Option<[u8; 13]>,
    provenance: Provenance,
    reader: &mut ByteReader<'_>,
) -> DecodedPacket {
    let remaining = reader.read_vec(reader.remaining()).unwrap_or_default();
    DecodedPacket {
        apid,
        kind: PacketKind::Unknown,
        ccsds_bytes,
        header_byte,
        packet_timestamp: None,
        transfer_frame_header: tf_header,
        payload: PacketPayload::Unknown(remaining),
        provenance,
        absolute_time: Vec::new(),
        quality: QualityCode::CREDIBLE,
    }
}

/// Decode a single packet slot, given whether a 6-byte CCSDS primary
/// header is present at its start (always true for a master-frame
/// slot; determined by size for standalone GSE input).
///
/// Never fails: unsupported APIDs, mismatched header bytes, and
/// undersized buffers all downgrade to [`PacketKind::Unknown`] with
/// the raw remaining bytes retained, each pushing a matching
/// [`Warning`] rather than aborting decoding.
fn decode_packet_slot(
    raw: &[u8],
    ccsds_present: bool,
    tf_header: Option<[u8; 13]>,
    provenance: Provenance,
) -> (DecodedPacket, Vec<Warning>) {
    let mut warnings = Vec::new();
    let mut reader = ByteReader::new(raw);

    if ccsds_present {
        let ccsds_bytes = match reader.read_slice(6) {
            Ok(s) => s.to_vec(),
            Err(DecodeError::SizeMismatch { actual }) => {
                warnings.push(Warning::SizeMismatch { actual });
                return (unknown_packet(0, Vec::new(), None, tf_header, provenance, &mut reader), warnings);
            }
            Err(e) => unreachable!("read_slice only returns SizeMismatch: {e}"),
        };
        let apid_value = u16::from_be_bytes([ccsds_bytes[0], ccsds_bytes[1]]);

        let kind = match apid::kind_for_apid(apid_value) {
            Some(k) => k,
            None => {
                warnings.push(Warning::UnsupportedApid { apid: apid_value });
                return (
                    unknown_packet(apid_value, ccsds_bytes, None, tf_header, provenance, &mut reader),
                    warnings,
                );
            }
        };

        let header_byte = match kind {
            PacketKind::Stein | PacketKind::Magic => match reader.read_u8() {
                Ok(b) => Some(b),
                Err(DecodeError::SizeMismatch { actual }) => {
                    warnings.push(Warning::SizeMismatch { actual });
                    return (
                        unknown_packet(apid_value, ccsds_bytes, None, tf_header, provenance, &mut reader),
                        warnings,
                    );
                }
                Err(e) => unreachable!("read_u8 only returns SizeMismatch: {e}"),
            },
            _ => None,
        };

        if let Some(hb) = header_byte {
            let expected = if kind == PacketKind::Stein { apid::HEADER_STEIN } else { apid::HEADER_MAGIC };
            if hb != expected {
                warnings.push(Warning::InvalidHeader { byte: hb });
                return (
                    unknown_packet(apid_value, ccsds_bytes, Some(hb), tf_header, provenance, &mut reader),
                    warnings,
                );
            }
        }

        let body_result = match kind {
            PacketKind::Stein => decode_stein_body(&mut reader, &mut warnings),
            PacketKind::Magic => decode_magic_body(&mut reader),
            PacketKind::HskRecorded | PacketKind::HskRecent => {
                decode_hsk_body(&mut reader).map(|(ts, frame)| {
                    let payload = if kind == PacketKind::HskRecorded {
                        PacketPayload::HskRecorded(frame)
                    } else {
                        PacketPayload::HskRecent(frame)
                    };
                    (ts, payload)
                })
            }
            PacketKind::Overflow | PacketKind::Unknown => unreachable!("not returned by kind_for_apid"),
        };

        match body_result {
            Ok((ts, payload)) => (
                DecodedPacket {
                    apid: apid_value,
                    kind,
                    ccsds_bytes,
                    header_byte,
                    packet_timestamp: Some(ts),
                    transfer_frame_header: tf_header,
                    payload,
                    provenance,
                    absolute_time: Vec::new(),
                    quality: QualityCode::CREDIBLE,
                },
                warnings,
            ),
            Err(DecodeError::SizeMismatch { actual }) => {
                warnings.push(Warning::SizeMismatch { actual });
                (unknown_packet(apid_value, ccsds_bytes, header_byte, tf_header, provenance, &mut reader), warnings)
            }
            Err(e) => unreachable!("packet body decoding only surfaces SizeMismatch: {e}"),
        }
    } else {
        let header_byte = match reader.read_u8() {
            Ok(b) => b,
            Err(DecodeError::SizeMismatch { actual }) => {
                warnings.push(Warning::SizeMismatch { actual });
                return (unknown_packet(0, Vec::new(), None, tf_header, provenance, &mut reader), warnings);
            }
            Err(e) => unreachable!("read_u8 only returns SizeMismatch: {e}"),
        };

        let kind = match apid::kind_for_header_byte(header_byte) {
            Some(k) => k,
            None => {
                warnings.push(Warning::InvalidHeader { byte: header_byte });
                return (
                    unknown_packet(0, Vec::new(), Some(header_byte), tf_header, provenance, &mut reader),
                    warnings,
                );
            }
        };

        let (apid_value, body_result) = match kind {
            PacketKind::Stein => (apid::APID_STEIN, decode_stein_body(&mut reader, &mut warnings)),
            PacketKind::Magic => (apid::APID_MAGIC, decode_magic_body(&mut reader)),
            _ => unreachable!("kind_for_header_byte only returns Stein/Magic"),
        };

        match body_result {
            Ok((ts, payload)) => (
                DecodedPacket {
                    apid: apid_value,
                    kind,
                    ccsds_bytes: Vec::new(),
                    header_byte: Some(header_byte),
                    packet_timestamp: Some(ts),
                    transfer_frame_header: tf_header,
                    payload,
                    provenance,
                    absolute_time: Vec::new(),
                    quality: QualityCode::CREDIBLE,
                },
                warnings,
            ),
            Err(DecodeError::SizeMismatch { actual }) => {
                warnings.push(Warning::SizeMismatch { actual });
                (
                    unknown_packet(apid_value, Vec::new(), Some(header_byte), tf_header, provenance, &mut reader),
                    warnings,
                )
            }
            Err(e) => unreachable!("packet body decoding only surfaces SizeMismatch: {e}"),
        }
    }
}

/// Decode a single packet with no surrounding master frame, as read
/// from a headerless GSE hex dump, autodetecting whether a CCSDS
/// header is present from `raw`'s size. Equivalent to
/// [`decode_standalone_packet_with_options`] with the default
/// [`DecoderOptions`].
pub fn decode_standalone_packet(
    raw: &[u8],
    provenance: Provenance,
) -> Result<(DecodedPacket, Vec<Warning>), DecodeError> {
    decode_standalone_packet_with_options(raw, provenance, DecoderOptions::default())
}

/// Decode a single packet with no surrounding master frame, as read
/// from a headerless GSE hex dump. `raw` must be 512 bytes (CCSDS
/// header stripped) or 518 bytes (CCSDS header present) unless
/// `options.ccsds_present` overrides autodetection; any other
/// undetermined size is a hard [`DecodeError::SizeMismatch`].
pub fn decode_standalone_packet_with_options(
    raw: &[u8],
    provenance: Provenance,
    options: DecoderOptions,
) -> Result<(DecodedPacket, Vec<Warning>), DecodeError> {
    let ccsds_present = match options.ccsds_present {
        Some(present) => present,
        None => match raw.len() {
            518 => true,
            512 => false,
            actual => return Err(DecodeError::SizeMismatch { actual }),
        },
    };
    Ok(decode_packet_slot(raw, ccsds_present, None, provenance))
}

/// Decode one 1289-byte master frame into its (up to) two science/HSK
/// packets and its overflow packet, pushing any diagnostics to
/// `warnings`.
fn decode_master_frame(
    frame: &[u8],
    source_path: &str,
    source_sha1: &str,
    warnings: &mut Vec<Warning>,
) -> Vec<DecodedPacket> {
    debug_assert_eq!(frame.len(), MASTER_FRAME_LEN);

    let asm_bytes = &frame[OFFSETS[1]..OFFSETS[2]];
    let observed_asm = be_uint(asm_bytes);
    if observed_asm != ASM {
        warnings.push(Warning::AsmMismatch { observed: observed_asm });
    }

    let tf_header: [u8; 13] =
        frame[OFFSETS[2]..OFFSETS[3]].try_into().expect("transfer-frame header slice is 13 bytes");
    let packet_1 = &frame[OFFSETS[3]..OFFSETS[4]];
    let packet_2 = &frame[OFFSETS[4]..OFFSETS[5]];
    let overflow_bytes = &frame[OFFSETS[5]..OFFSETS[6]];

    let provenance =
        Provenance { source_path: source_path.to_string(), source_sha1: source_sha1.to_string(), extracted_at: Utc::now() };

    let mut packets = Vec::with_capacity(3);

    for slot in [packet_1, packet_2] {
        let (packet, mut slot_warnings) = decode_packet_slot(slot, true, Some(tf_header), provenance.clone());
        warnings.append(&mut slot_warnings);
        packets.push(packet);
    }

    let overflow_apid = u16::from_be_bytes([overflow_bytes[0], overflow_bytes[1]]);
    if overflow_apid == apid::APID_OVERFLOW {
        packets.push(DecodedPacket {
            apid: overflow_apid,
            kind: PacketKind::Overflow,
            ccsds_bytes: Vec::new(),
            header_byte: None,
            packet_timestamp: None,
            transfer_frame_header: Some(tf_header),
            payload: PacketPayload::Overflow(overflow_bytes.to_vec()),
            provenance,
            absolute_time: Vec::new(),
            quality: QualityCode::CREDIBLE,
        });
    } else {
        warnings.push(Warning::UnsupportedApid { apid: overflow_apid });
        packets.push(DecodedPacket {
            apid: overflow_apid,
            kind: PacketKind::Unknown,
            ccsds_bytes: Vec::new(),
            header_byte: None,
            packet_timestamp: None,
            transfer_frame_header: Some(tf_header),
            payload: PacketPayload::Unknown(overflow_bytes.to_vec()),
            provenance,
            absolute_time: Vec::new(),
            quality: QualityCode::CREDIBLE,
        });
    }

    packets
}

/// Decode an entire telemetry source (the concatenation of however
/// many 1289-byte master frames it holds) into its packets. A final
/// partial frame shorter than [`MASTER_FRAME_LEN`] is silently
/// dropped, on the assumption that ground-segment delivery is always
/// frame-aligned.
pub fn decode_source(bytes: &[u8], source_path: &str) -> DemuxOutput {
    let source_sha1 = hex_sha1(bytes);
    let mut packets = Vec::new();
    let mut warnings = Vec::new();

    for frame in bytes.chunks_exact(MASTER_FRAME_LEN) {
        packets.extend(decode_master_frame(frame, source_path, &source_sha1, &mut warnings));
    }

    DemuxOutput { packets, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_master_frame(apid1: u16, header1: u8, apid2: u16, header2: u8) -> Vec<u8> {
        let mut frame = vec![0u8; MASTER_FRAME_LEN];
        frame[OFFSETS[1]..OFFSETS[2]].copy_from_slice(&ASM.to_be_bytes());
        frame[OFFSETS[3]] = (apid1 >> 8) as u8;
        frame[OFFSETS[3] + 1] = apid1 as u8;
        frame[OFFSETS[3] + 2] = header1;
        frame[OFFSETS[4]] = (apid2 >> 8) as u8;
        frame[OFFSETS[4] + 1] = apid2 as u8;
        frame[OFFSETS[4] + 2] = header2;
        frame[OFFSETS[5]] = (apid::APID_OVERFLOW >> 8) as u8;
        frame[OFFSETS[5] + 1] = apid::APID_OVERFLOW as u8;
        frame
    }

    #[test]
    fn decodes_two_stein_packets_with_valid_asm() {
        let frame = valid_master_frame(apid::APID_STEIN, apid::HEADER_STEIN, apid::APID_STEIN, apid::HEADER_STEIN);
        let output = decode_source(&frame, "test.bin");
        assert!(output.warnings.is_empty());
        assert_eq!(output.packets.len(), 3);
        assert_eq!(output.packets[0].kind, PacketKind::Stein);
        assert_eq!(output.packets[1].kind, PacketKind::Stein);
        assert_eq!(output.packets[2].kind, PacketKind::Overflow);
        match &output.packets[0].payload {
            PacketPayload::Stein { events, .. } => assert_eq!(events.len(), stein::EVENT_COUNT),
            other => panic!("expected Stein payload, got {other:?}"),
        }
    }

    #[test]
    fn flags_asm_mismatch_but_still_decodes() {
        let mut frame = valid_master_frame(apid::APID_STEIN, apid::HEADER_STEIN, apid::APID_STEIN, apid::HEADER_STEIN);
        frame[OFFSETS[1]] = 0xFF;
        let output = decode_source(&frame, "test.bin");
        assert!(output.warnings.iter().any(|w| matches!(w, Warning::AsmMismatch { .. })));
        assert_eq!(output.packets[0].kind, PacketKind::Stein);
    }

    #[test]
    fn unsupported_apid_becomes_unknown_with_warning() {
        let frame = valid_master_frame(0x0950, 0x00, apid::APID_STEIN, apid::HEADER_STEIN);
        let output = decode_source(&frame, "test.bin");
        assert_eq!(output.packets[0].kind, PacketKind::Unknown);
        assert!(output.warnings.iter().any(|w| matches!(w, Warning::UnsupportedApid { apid: 0x0950 })));
    }

    #[test]
    fn mismatched_header_byte_becomes_unknown() {
        let frame = valid_master_frame(apid::APID_STEIN, 0x00, apid::APID_STEIN, apid::HEADER_STEIN);
        let output = decode_source(&frame, "test.bin");
        assert_eq!(output.packets[0].kind, PacketKind::Unknown);
        assert!(output.warnings.iter().any(|w| matches!(w, Warning::InvalidHeader { byte: 0x00 })));
    }

    #[test]
    fn decodes_magic_and_hsk_slots() {
        let frame = valid_master_frame(apid::APID_MAGIC, apid::HEADER_MAGIC, apid::APID_HSK_RECORDED, 0x00);
        let output = decode_source(&frame, "test.bin");
        assert_eq!(output.packets[0].kind, PacketKind::Magic);
        assert_eq!(output.packets[1].kind, PacketKind::HskRecorded);
        match &output.packets[0].payload {
            PacketPayload::Magic { samples } => assert_eq!(samples.len(), magic::SAMPLE_COUNT),
            other => panic!("expected Magic payload, got {other:?}"),
        }
    }

    #[test]
    fn standalone_headerless_packet_dispatches_by_header_byte() {
        let mut raw = vec![0u8; 512];
        raw[0] = apid::HEADER_MAGIC;
        let provenance = Provenance {
            source_path: "gse.txt".to_string(),
            source_sha1: "deadbeef".to_string(),
            extracted_at: Utc::now(),
        };
        let (packet, warnings) = decode_standalone_packet(&raw, provenance).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(packet.kind, PacketKind::Magic);
        assert_eq!(packet.apid, apid::APID_MAGIC);
    }

    #[test]
    fn decoder_options_override_ccsds_autodetection() {
        // A 518-byte buffer autodetects as CCSDS-present, reading
        // byte 0 as half of the APID rather than a header byte -- so
        // by default this buffer does NOT dispatch as MAGIC.
        let mut raw = vec![0u8; 518];
        raw[0] = apid::HEADER_MAGIC;
        let provenance =
            Provenance { source_path: "gse.txt".to_string(), source_sha1: "deadbeef".to_string(), extracted_at: Utc::now() };

        let (default_packet, _) = decode_standalone_packet(&raw, provenance.clone()).unwrap();
        assert_eq!(default_packet.kind, PacketKind::Unknown);

        let options = DecoderOptions { ccsds_present: Some(false) };
        let (overridden, warnings) = decode_standalone_packet_with_options(&raw, provenance, options).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(overridden.kind, PacketKind::Magic);
        assert!(overridden.ccsds_bytes.is_empty());
    }

    #[test]
    fn standalone_packet_rejects_bad_size() {
        let provenance =
            Provenance { source_path: "x".to_string(), source_sha1: "x".to_string(), extracted_at: Utc::now() };
        let result = decode_standalone_packet(&[0u8; 100], provenance);
        assert!(matches!(result, Err(DecodeError::SizeMismatch { actual: 100 })));
    }

    #[test]
    fn multiple_master_frames_in_one_source_all_decode() {
        let frame = valid_master_frame(apid::APID_STEIN, apid::HEADER_STEIN, apid::APID_STEIN, apid::HEADER_STEIN);
        let mut bytes = frame.clone();
        bytes.extend_from_slice(&frame);
        let output = decode_source(&bytes, "two_frames.bin");
        assert_eq!(output.packets.len(), 6);
    }
}
