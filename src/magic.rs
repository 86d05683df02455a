//! MAGIC magnetometer packet decoding: 39 fixed-format 13-byte vector
//! samples per 507-byte data subframe.

use crate::reader::sign_magnitude_24;

/// Number of MAGIC samples packed into one 507-byte data subframe.
pub const SAMPLE_COUNT: usize = 39;
/// Size in bytes of one MAGIC sample.
pub const SAMPLE_LEN: usize = 13;
/// Size in bytes of the MAGIC data subframe.
pub const SUBFRAME_LEN: usize = SAMPLE_COUNT * SAMPLE_LEN;

/// CINEMA flight-software instrument mode (not the MAGIC ICD's own
/// mode numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrumentMode {
    /// Mode 0: attitude config. No data is returned in this mode; a
    /// sample tagged with it should not occur in recorded telemetry.
    AttitudeConfig,
    /// Mode 1: attitude, one 13-byte report.
    Attitude,
    /// Mode 2: "Science A'", one 13-byte report.
    ScienceA,
    /// Mode 3: gradiometer, two 13-byte reports.
    Gradiometer,
    /// An FSW mode value outside `0..=3`; these are unused by CINEMA 1.
    Reserved(u8),
}

impl InstrumentMode {
    fn from_bits(bits: u8) -> InstrumentMode {
        match bits {
            0 => InstrumentMode::AttitudeConfig,
            1 => InstrumentMode::Attitude,
            2 => InstrumentMode::ScienceA,
            3 => InstrumentMode::Gradiometer,
            other => InstrumentMode::Reserved(other),
        }
    }
}

/// Which sensor head a sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Sensor {
    Outboard,
    Inboard,
}

/// A single decoded MAGIC sample: a status byte plus four 24-bit
/// sign-magnitude channel readings.
///
/// When `mt` selects [`Reading::Vector`] the four channels are
/// `(Bx, By, Bz, TEMP)`; when it selects [`Reading::Temperature`] the
/// same four byte positions are instead a `(TEMP_A, TEMP_B, TEMP_A,
/// TEMP_B)` pair repeated -- CINEMA's flight software never actually
/// emits this mode, so decoding still extracts it uniformly and lets
/// the timing engine flag it as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagicSample {
    pub mode: InstrumentMode,
    pub sensor: Sensor,
    pub reading: Reading,
}

/// The interpretation of a sample's four channel words, selected by
/// the status byte's MT bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reading {
    /// MT=0: a magnetic field vector plus sensor-head temperature.
    Vector { bx: i32, by: i32, bz: i32, temp: i32 },
    /// MT=1: a pair of redundant temperature channels, unused by
    /// CINEMA 1's flight software.
    Temperature { temp_a: i32, temp_b: i32 },
}

impl MagicSample {
    /// `mt` bit this sample's status byte carried, independent of
    /// which [`Reading`] variant it decoded into.
    pub fn mt(&self) -> u8 {
        match self.reading {
            Reading::Vector { .. } => 0,
            Reading::Temperature { .. } => 1,
        }
    }
}

fn decode_channel(bytes: &[u8]) -> i32 {
    debug_assert_eq!(bytes.len(), 3);
    let raw = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;
    sign_magnitude_24(raw)
}

/// Decode a single 13-byte sample: 1 status byte, {Bx, By, Bz, TEMP}
/// as four 3-byte sign-magnitude channels.
pub fn parse_sample(bytes: &[u8; SAMPLE_LEN]) -> MagicSample {
    let status = bytes[0];
    let mode = InstrumentMode::from_bits((status >> 2) & 0b111);
    let sensor = if (status >> 1) & 1 == 0 { Sensor::Outboard } else { Sensor::Inboard };
    let mt = status & 1;

    let c1 = decode_channel(&bytes[1..4]);
    let c2 = decode_channel(&bytes[4..7]);
    let c3 = decode_channel(&bytes[7..10]);
    let c4 = decode_channel(&bytes[10..13]);

    let reading = if mt == 0 {
        Reading::Vector { bx: c1, by: c2, bz: c3, temp: c4 }
    } else {
        Reading::Temperature { temp_a: c1, temp_b: c3 }
    };

    MagicSample { mode, sensor, reading }
}

/// Decode the full 507-byte MAGIC subframe into its 39 samples.
pub fn decode_samples(subframe: &[u8; SUBFRAME_LEN]) -> Vec<MagicSample> {
    subframe
        .chunks_exact(SAMPLE_LEN)
        .map(|chunk| {
            let array: [u8; SAMPLE_LEN] = chunk.try_into().expect("chunks_exact guarantees length");
            parse_sample(&array)
        })
        .collect()
}
