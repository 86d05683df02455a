//! STEIN particle-detector packet decoding: 198 bit-packed 20-bit
//! events per 495-byte data subframe, plus an 8-byte IIB housekeeping
//! trailer.

use crate::error::DecodeError;

/// Number of STEIN events packed into one 495-byte data subframe.
pub const EVENT_COUNT: usize = 198;
/// Size in bytes of the STEIN event subframe.
pub const SUBFRAME_LEN: usize = 495;
/// Size in bytes of the IIB housekeeping trailer.
pub const HOUSEKEEPING_LEN: usize = 8;

/// A single decoded STEIN event. The event's shape is determined by
/// `EVCODE`; fields the source encoding has no room for are simply
/// absent from the matching variant, rather than filled with a
/// sentinel (e.g. Python's `-1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SteinEvent {
    /// EVCODE 0: a data event. `det_id` (5 bits), `time_stamp` (6
    /// bits, 2 LSB already dropped on board), `event_data` (7 bits,
    /// log-binned).
    Data { det_id: u8, time_stamp: u8, event_data: u8 },
    /// EVCODE 1: a per-second trigger-count checksum. `time_stamp` (6
    /// bits, 2 MSB already dropped), `event_data` (12 bits).
    TriggerChecksum { time_stamp: u8, event_data: u16 },
    /// EVCODE 2: a per-second event-count checksum. Same shape as
    /// [`SteinEvent::TriggerChecksum`].
    EventChecksum { time_stamp: u8, event_data: u16 },
    /// EVCODE 3, ADD 0: a noise event. `det_id` is a single bit;
    /// `event_data` is the full 16-bit field.
    Noise { det_id: u8, event_data: u16 },
    /// EVCODE 3, ADD 1: a status event. `status_id` occupies the
    /// event's TIMESTAMP slot and is masked to 8 bits, despite the
    /// field's 9-bit allocation in the on-board format -- the 9th bit
    /// is discarded on the ground, not on board. `event_data` is the
    /// low byte.
    Status { status_id: u8, event_data: u8 },
}

/// The 8-count IIB (Instrument Interface Board) housekeeping trailer
/// appended to every STEIN packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SteinHousekeeping {
    pub spi_buffer_overflow_count: u8,
    pub spi_buffer_underflow_count: u8,
    pub spi_buffer_checksum_error_count: u8,
    pub i2c_buffer_checksum_error_count: u8,
    pub i2c_buffer_underflow_count: u8,
    pub i2c_buffer_overflow_count: u8,
    pub cdi_parity_error_count: u8,
    pub cdi_framing_error_count: u8,
}

impl SteinHousekeeping {
    /// Parse from the 8-byte trailer, in on-wire field order.
    pub fn from_bytes(bytes: &[u8; HOUSEKEEPING_LEN]) -> SteinHousekeeping {
        SteinHousekeeping {
            spi_buffer_overflow_count: bytes[0],
            spi_buffer_underflow_count: bytes[1],
            spi_buffer_checksum_error_count: bytes[2],
            i2c_buffer_checksum_error_count: bytes[3],
            i2c_buffer_underflow_count: bytes[4],
            i2c_buffer_overflow_count: bytes[5],
            cdi_parity_error_count: bytes[6],
            cdi_framing_error_count: bytes[7],
        }
    }
}

/// Split the 495-byte STEIN subframe into 198 raw 20-bit event words.
///
/// Every 5 raw bytes hold 2 complete 20-bit events: `event1` takes the
/// low nibble of byte 2 as its high bits, then all of bytes 1 and 0;
/// `event2` takes all of byte 4, all of byte 3, and the high nibble of
/// byte 2.
fn split_event_words(subframe: &[u8; SUBFRAME_LEN]) -> [u32; EVENT_COUNT] {
    let mut words = [0u32; EVENT_COUNT];
    for (i, chunk) in subframe.chunks_exact(5).enumerate() {
        let event1 = ((chunk[2] as u32 & 0x0F) << 16) | ((chunk[1] as u32) << 8) | chunk[0] as u32;
        let event2 = ((chunk[4] as u32) << 12) | ((chunk[3] as u32) << 4) | (chunk[2] as u32 >> 4);
        words[2 * i] = event1;
        words[2 * i + 1] = event2;
    }
    words
}

/// Decode a single raw 20-bit event word into a [`SteinEvent`].
pub fn parse_event(word: u32) -> Result<SteinEvent, DecodeError> {
    let evcode = (word >> 18) & 0b11;
    match evcode {
        0 => Ok(SteinEvent::Data {
            det_id: ((word >> (20 - (2 + 5))) & 0x1F) as u8,
            time_stamp: ((word >> (20 - (2 + 5 + 6))) & 0x3F) as u8,
            event_data: ((word >> (20 - (2 + 5 + 6 + 7))) & 0x7F) as u8,
        }),
        1 => Ok(SteinEvent::TriggerChecksum {
            time_stamp: ((word >> (20 - (2 + 6))) & 0x3F) as u8,
            event_data: ((word >> (20 - (2 + 6 + 12))) & 0xFFF) as u16,
        }),
        2 => Ok(SteinEvent::EventChecksum {
            time_stamp: ((word >> (20 - (2 + 6))) & 0x3F) as u8,
            event_data: ((word >> (20 - (2 + 6 + 12))) & 0xFFF) as u16,
        }),
        3 => {
            let add = (word >> (20 - (2 + 1))) & 1;
            match add {
                0 => Ok(SteinEvent::Noise {
                    det_id: ((word >> (20 - (2 + 1 + 1))) & 1) as u8,
                    event_data: (word & 0xFFFF) as u16,
                }),
                1 => Ok(SteinEvent::Status {
                    status_id: ((word >> (20 - (2 + 1 + 9))) & 0xFF) as u8,
                    event_data: (word & 0xFF) as u8,
                }),
                other => Err(DecodeError::InvalidAdd(other as u8)),
            }
        }
        other => Err(DecodeError::InvalidEventCode(other as u8)),
    }
}

/// Encode a single event back into its raw 20-bit word. The inverse
/// of [`parse_event`] for any event whose decoded fields fit their bit
/// widths -- used to check the round-trip law on well-formed bytes.
pub fn encode_event(event: &SteinEvent) -> u32 {
    match *event {
        SteinEvent::Data { det_id, time_stamp, event_data } => {
            ((det_id as u32) << 13) | ((time_stamp as u32) << 7) | event_data as u32
        }
        SteinEvent::TriggerChecksum { time_stamp, event_data } => {
            (1 << 18) | ((time_stamp as u32) << 12) | event_data as u32
        }
        SteinEvent::EventChecksum { time_stamp, event_data } => {
            (2 << 18) | ((time_stamp as u32) << 12) | event_data as u32
        }
        SteinEvent::Noise { det_id, event_data } => {
            (3 << 18) | ((det_id as u32) << 16) | event_data as u32
        }
        SteinEvent::Status { status_id, event_data } => {
            (3 << 18) | (1 << 17) | ((status_id as u32) << 8) | event_data as u32
        }
    }
}

/// Re-pack 198 raw 20-bit event words into the 495-byte subframe, the
/// inverse of [`split_event_words`].
fn join_event_words(words: &[u32; EVENT_COUNT]) -> [u8; SUBFRAME_LEN] {
    let mut subframe = [0u8; SUBFRAME_LEN];
    for (chunk, pair) in subframe.chunks_exact_mut(5).zip(words.chunks_exact(2)) {
        let (event1, event2) = (pair[0], pair[1]);
        chunk[0] = event1 as u8;
        chunk[1] = (event1 >> 8) as u8;
        chunk[2] = (((event1 >> 16) & 0x0F) | ((event2 & 0x0F) << 4)) as u8;
        chunk[3] = (event2 >> 4) as u8;
        chunk[4] = (event2 >> 12) as u8;
    }
    subframe
}

/// Re-encode a full list of 198 events back into a 495-byte subframe,
/// the inverse of [`decode_events`] for events with no dropped
/// entries.
pub fn encode_events(events: &[SteinEvent; EVENT_COUNT]) -> [u8; SUBFRAME_LEN] {
    let mut words = [0u32; EVENT_COUNT];
    for (w, event) in words.iter_mut().zip(events.iter()) {
        *w = encode_event(event);
    }
    join_event_words(&words)
}

/// Decode the full 495-byte STEIN subframe into its 198 events.
/// Individual events that fail to parse (an EVCODE-3 event with a
/// corrupted ADD bit, which should be structurally impossible since
/// ADD is a single masked bit, but is not assumed away) are reported
/// by index to the caller via `on_invalid`, and dropped from the
/// returned list.
pub fn decode_events(
    subframe: &[u8; SUBFRAME_LEN],
    mut on_invalid: impl FnMut(usize),
) -> Vec<SteinEvent> {
    let words = split_event_words(subframe);
    let mut events = Vec::with_capacity(EVENT_COUNT);
    for (i, &word) in words.iter().enumerate() {
        match parse_event(word) {
            Ok(event) => events.push(event),
            Err(_) => on_invalid(i),
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subframe_from(chunk: [u8; 5]) -> [u8; SUBFRAME_LEN] {
        let mut buf = [0u8; SUBFRAME_LEN];
        buf[..5].copy_from_slice(&chunk);
        buf
    }

    #[test]
    fn splits_five_bytes_into_two_events() {
        let subframe = subframe_from([0x34, 0x12, 0xF0, 0x78, 0x56]);
        let words = split_event_words(&subframe);
        assert_eq!(words[0], 0x01234);
        assert_eq!(words[1], 0x5678F);
    }

    #[test]
    fn decodes_evcode0_data_event() {
        let det_id = 0b10101u32;
        let time_stamp = 0b101010u32;
        let event_data = 0b1100110u32;
        let word = (0u32 << 18) | (det_id << 13) | (time_stamp << 7) | event_data;
        match parse_event(word).unwrap() {
            SteinEvent::Data { det_id: d, time_stamp: t, event_data: e } => {
                assert_eq!(d, 0b10101);
                assert_eq!(t, 0b101010);
                assert_eq!(e, 0b1100110);
            }
            other => panic!("expected Data event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_evcode3_add1_status_event() {
        let status_id = 0x7Fu32;
        let event_data = 0xABu32;
        let word = (3u32 << 18) | (1u32 << 17) | (status_id << 8) | event_data;
        match parse_event(word).unwrap() {
            SteinEvent::Status { status_id: s, event_data: e } => {
                assert_eq!(s, 0x7F);
                assert_eq!(e, 0xAB);
            }
            other => panic!("expected Status event, got {other:?}"),
        }
    }

    #[test]
    fn decodes_evcode3_add0_noise_event() {
        let det_id = 1u32;
        let event_data = 0xBEEFu32;
        let word = (3u32 << 18) | (0u32 << 17) | (det_id << 16) | (event_data & 0xFFFF);
        match parse_event(word).unwrap() {
            SteinEvent::Noise { det_id: d, event_data: e } => {
                assert_eq!(d, 1);
                assert_eq!(e, 0xBEEF);
            }
            other => panic!("expected Noise event, got {other:?}"),
        }
    }

    #[test]
    fn event_round_trips_through_encode_decode() {
        let word = (0u32 << 18) | (0b10101 << 13) | (0b101010 << 7) | 0b1100110;
        let event = parse_event(word).unwrap();
        assert_eq!(encode_event(&event), word);
    }

    #[test]
    fn subframe_round_trips_through_split_and_join() {
        let subframe = subframe_from([0x34, 0x12, 0xF0, 0x78, 0x56]);
        let words = split_event_words(&subframe);
        assert_eq!(join_event_words(&words), subframe);
    }

    #[test]
    fn decode_then_encode_reproduces_well_formed_subframe() {
        // Built from known events rather than arbitrary seed bytes: a
        // Status event's bit 16 has no field to round-trip through
        // (parse_event only reads bits 15..8 for status_id, matching
        // stein_unpack_v0_8_0.py's `& 255`), so an arbitrary raw word
        // is not guaranteed losslessly representable. Events built
        // from in-range field values are.
        let mut events: Vec<SteinEvent> = Vec::with_capacity(EVENT_COUNT);
        for i in 0..EVENT_COUNT {
            let event = match i % 5 {
                0 => SteinEvent::Data {
                    det_id: (i as u8) & 0x1F,
                    time_stamp: (i as u8) & 0x3F,
                    event_data: (i as u8) & 0x7F,
                },
                1 => SteinEvent::TriggerChecksum { time_stamp: (i as u8) & 0x3F, event_data: (i as u16 * 7) & 0xFFF },
                2 => SteinEvent::EventChecksum { time_stamp: (i as u8) & 0x3F, event_data: (i as u16 * 11) & 0xFFF },
                3 => SteinEvent::Noise { det_id: (i as u8) & 1, event_data: (i as u16 * 13) & 0xFFFF },
                _ => SteinEvent::Status { status_id: (i as u8 * 3) & 0xFF, event_data: (i as u8 * 5) & 0xFF },
            };
            events.push(event);
        }
        let events: [SteinEvent; EVENT_COUNT] = events.try_into().unwrap();
        let subframe = encode_events(&events);

        let mut dropped = Vec::new();
        let decoded = decode_events(&subframe, |i| dropped.push(i));
        assert!(dropped.is_empty());
        assert_eq!(decoded.as_slice(), events.as_slice());
        assert_eq!(encode_events(&events), subframe);
    }

    #[test]
    fn housekeeping_reads_fields_in_order() {
        let bytes = [1, 2, 3, 4, 5, 6, 7, 8];
        let hk = SteinHousekeeping::from_bytes(&bytes);
        assert_eq!(hk.spi_buffer_overflow_count, 1);
        assert_eq!(hk.cdi_framing_error_count, 8);
    }
}
