//! Housekeeping packet decoding.
//!
//! Two unrelated bitfield catalogs share the HSK packet kind: a
//! densely bitfield-packed "slow" sweep (subsystem status, ACS,
//! instrument health) and a "fast" sweep of 10-bit ADC-channel
//! readings that repeats a fixed 48-channel layout seven times.

/// Size in bytes of the slow-HSK subframe as it appears on the wire.
/// Only the first [`SLOW_HSK_LEN`] bytes are assigned fields; the
/// remainder is unallocated spare, per the source's own "GENERAL SLOW
/// HSK SPARE *NOT IMPLEMENTED*" note.
pub const SLOW_HSK_FRAME_LEN: usize = 86;
/// Size in bytes of the slow-HSK fields actually decoded by
/// [`decode_slow`].
pub const SLOW_HSK_LEN: usize = 79;
/// Size in bytes of the fast-HSK 10-bit-packed block.
pub const FAST_HSK_LEN: usize = 420;
/// Number of 10-bit values (44 real channels + 4 spares) in one
/// fast-HSK repeat.
pub const FAST_HSK_CHANNELS_PER_SWEEP: usize = 48;
/// Number of times the 48-channel layout repeats in one fast-HSK
/// block.
pub const FAST_HSK_SWEEP_COUNT: usize = 7;

/// Names of the 48 channels in one fast-HSK sweep, in on-wire order.
/// The final four are permanently-unpopulated spares.
pub const FAST_HSK_CHANNELS: [&str; FAST_HSK_CHANNELS_PER_SWEEP] = [
    "PANEL_X1_CURRENT", "PANEL_X2_CURRENT", "PANEL_Y1_CURRENT", "PANEL_Y2_CURRENT",
    "PANEL_Z1_CURRENT", "PANEL_Z2_CURRENT",
    "PANEL_X_VOLT", "PANEL_X1_TEMP", "PANEL_X2_TEMP", "PANEL_Y_VOLT", "PANEL_Y1_TEMP",
    "PANEL_Y2_TEMP", "PANEL_Z_VOLT", "PANEL_Z1_TEMP", "PANEL_Z2_TEMP", "V5_BUS_CURRENT",
    "V3.3_CURR", "BATT_BUS_CURR",
    "BATT_CURR_DIR", "BATT_VOLT", "BATT_CURR", "BATT_TEMP", "BATT1_CURR_DIR", "BATT1_VOLT",
    "BATT1_CURR", "BATT1_TEMP", "BATT2_CURR_DIR", "BATT2_VOLT", "BATT2_CURR", "BATT2_TEMP",
    "CELL_VOLT", "CELL1_VOLT", "CELL2_VOLT",
    "VMON_RAW_N", "VMON_RAW_P", "SENSE", "IMON_RAW", "IIB_TEMP", "VMON_MAG5V", "SBAND_TEMP",
    "VMON_STEIN5V", "STEIN_TEMP", "VMON_STEINHV8V", "OLD_SBAND_TEMP",
    "SPARE1", "SPARE2", "SPARE3", "SPARE4",
];

/// Enabled-device bitfield, byte 0 of DEVENABLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceEnable {
    pub flash: bool,
    pub sband: bool,
    pub torquer: bool,
    pub actuator: bool,
    pub mag: bool,
    pub stein: bool,
    pub attitude: bool,
    pub high_voltage: bool,
    pub scan: bool,
    pub rtc: bool,
    pub iib: bool,
    pub uhf: bool,
}

/// Enabled-peripheral bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeripheralEnable {
    pub timer2: bool,
    pub timer3: bool,
    pub timer4: bool,
    pub i2c1: bool,
    pub i2c2: bool,
    pub uart2: bool,
    pub adc: bool,
    pub uart1: bool,
    pub spi1: bool,
    pub spi2: bool,
    pub ic1: bool,
    pub ic5: bool,
    pub oc4: bool,
}

/// Command/event/trigger counters and flight-software state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Misc {
    pub trigger: u16,
    pub error_counter: u8,
    pub error_data: u16,
    pub error_code: u8,
    pub event_counter: u8,
    pub event_code: u8,
    pub command_total: u16,
    pub immediate_command_size: u8,
    pub delayed_command_size: u16,
    pub cinema_state: u8,
    pub beacon_state: u8,
    pub sram_page: u8,
}

/// Solid-state recorder read/write pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SsrState {
    pub hsk_packet_number: u32,
    pub data_packet_number: u32,
    pub hsk_packet_pointer: u16,
    pub data_packet_pointer: u16,
}

/// Antenna and boom deployment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeployControl {
    pub antenna_status: u8,
    pub boom_status: u8,
}

/// Attitude/boom power-sequencing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerControl {
    pub attitude_select: u8,
    pub attitude_time: u8,
    pub boom_time: u8,
    pub spare: u8,
}

/// Attitude control system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Acs {
    pub mode: u8,
    pub torque_coils: u8,
    pub elevation: u32,
    pub spin_rate: u32,
    pub omega_x: u32,
    pub omega_y: u32,
    pub omega_z: u32,
    pub ephemeris_integrity_1: u8,
    pub ephemeris_integrity_2: u8,
}

/// MAGIC instrument health as reported through slow HSK (distinct
/// from the science-data MAGIC packet itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagHousekeeping {
    pub fault: u8,
    pub status: u8,
    pub bx: u32,
    pub by: u32,
    pub bz: u32,
    /// Unallocated spare, carried verbatim.
    pub spare: u16,
}

/// STEIN instrument health as reported through slow HSK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SteinHealth {
    pub fault: u8,
    pub high_voltage_fault: u8,
    pub sweep_integrity: u8,
    /// Unallocated spare, carried verbatim.
    pub spare: u8,
}

/// A fully decoded 79-byte slow-HSK bitfield sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlowHousekeeping {
    pub flight_mode: u8,
    pub fsw_version_high: u8,
    pub fsw_version_low: u8,
    pub device_enable: DeviceEnable,
    pub peripheral_enable: PeripheralEnable,
    pub misc: Misc,
    pub ssr_state: SsrState,
    pub deploy_control: DeployControl,
    pub power_control: PowerControl,
    pub acs: Acs,
    pub mag_housekeeping: MagHousekeeping,
    pub stein_health: SteinHealth,
}

fn bit(byte: u8, position: u8) -> bool {
    (byte >> position) & 1 != 0
}

fn be16(bytes: &[u8]) -> u16 {
    ((bytes[0] as u16) << 8) | bytes[1] as u16
}

fn be24(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
}

fn be32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 24) | ((bytes[1] as u32) << 16) | ((bytes[2] as u32) << 8) | bytes[3] as u32
}

/// Decode a 79-byte slow-HSK sweep, following the field layout
/// `FLIGHTMODE(1) FSW_VERSION(1) DEVENABLE(2) PERIPHENABLE(2) MISC(16)
/// SSR_STATE(10) DEPLOY_CONTROL(2) POWER_CONTROL(4) ACS(24)
/// MAG_HOUSEKEEPING(13) STEIN_HOUSEKEEPING(4)`.
pub fn decode_slow(bytes: &[u8; SLOW_HSK_LEN]) -> SlowHousekeeping {
    let flight_mode = bytes[0];
    let fsw_version_high = bytes[1] >> 4;
    let fsw_version_low = bytes[1] & 0x0F;

    let devenable = &bytes[2..4];
    let device_enable = DeviceEnable {
        flash: bit(devenable[0], 7),
        sband: bit(devenable[0], 6),
        torquer: bit(devenable[0], 5),
        actuator: bit(devenable[0], 4),
        mag: bit(devenable[0], 3),
        stein: bit(devenable[0], 2),
        attitude: bit(devenable[0], 1),
        high_voltage: bit(devenable[0], 0),
        scan: bit(devenable[1], 7),
        rtc: bit(devenable[1], 6),
        iib: bit(devenable[1], 5),
        uhf: bit(devenable[1], 4),
    };

    let periphenable = &bytes[4..6];
    let peripheral_enable = PeripheralEnable {
        timer2: bit(periphenable[0], 7),
        timer3: bit(periphenable[0], 6),
        timer4: bit(periphenable[0], 5),
        i2c1: bit(periphenable[0], 4),
        i2c2: bit(periphenable[0], 3),
        uart2: bit(periphenable[0], 2),
        adc: bit(periphenable[0], 1),
        uart1: bit(periphenable[0], 0),
        spi1: bit(periphenable[1], 7),
        spi2: bit(periphenable[1], 6),
        ic1: bit(periphenable[1], 5),
        ic5: bit(periphenable[1], 4),
        oc4: bit(periphenable[1], 3),
    };

    let m = &bytes[6..22];
    let misc = Misc {
        trigger: be16(&m[0..2]),
        error_counter: m[2],
        error_data: be16(&m[3..5]),
        error_code: m[5],
        event_counter: m[6],
        event_code: m[7],
        command_total: be16(&m[8..10]),
        immediate_command_size: m[10],
        delayed_command_size: be16(&m[11..13]),
        cinema_state: m[13],
        beacon_state: m[14],
        sram_page: m[15],
    };

    let s = &bytes[22..32];
    let ssr_state = SsrState {
        hsk_packet_number: be24(&s[0..3]),
        data_packet_number: be24(&s[3..6]),
        hsk_packet_pointer: be16(&s[6..8]),
        data_packet_pointer: be16(&s[8..10]),
    };

    let deploy_control = DeployControl { antenna_status: bytes[32], boom_status: bytes[33] };

    let power_control = PowerControl {
        attitude_select: bytes[34],
        attitude_time: bytes[35],
        boom_time: bytes[36],
        spare: bytes[37],
    };

    let a = &bytes[38..62];
    let acs = Acs {
        mode: a[0],
        torque_coils: a[1],
        elevation: be32(&a[2..6]),
        spin_rate: be32(&a[6..10]),
        omega_x: be32(&a[10..14]),
        omega_y: be32(&a[14..18]),
        omega_z: be32(&a[18..22]),
        ephemeris_integrity_1: a[22],
        ephemeris_integrity_2: a[23],
    };

    let mg = &bytes[62..75];
    let mag_housekeeping = MagHousekeeping {
        fault: mg[0],
        status: mg[1],
        bx: be24(&mg[2..5]),
        by: be24(&mg[5..8]),
        bz: be24(&mg[8..11]),
        spare: be16(&mg[11..13]),
    };

    let st = &bytes[75..79];
    let stein_health = SteinHealth {
        fault: st[0],
        high_voltage_fault: st[1],
        sweep_integrity: st[2],
        spare: st[3],
    };

    SlowHousekeeping {
        flight_mode,
        fsw_version_high,
        fsw_version_low,
        device_enable,
        peripheral_enable,
        misc,
        ssr_state,
        deploy_control,
        power_control,
        acs,
        mag_housekeeping,
        stein_health,
    }
}

/// Unpack the 420-byte fast-HSK block into 336 raw 10-bit values
/// (every 5 raw bytes yield 4 packed 10-bit values), then reshape
/// into 7 sweeps of 48 channels each.
pub fn decode_fast(bytes: &[u8; FAST_HSK_LEN]) -> [[u16; FAST_HSK_CHANNELS_PER_SWEEP]; FAST_HSK_SWEEP_COUNT] {
    let mut flat = [0u16; FAST_HSK_SWEEP_COUNT * FAST_HSK_CHANNELS_PER_SWEEP];
    for (i, chunk) in bytes.chunks_exact(5).enumerate() {
        let v1 = ((chunk[0] as u16) << 2) | (chunk[1] as u16 >> 6);
        let v2 = (((chunk[1] & 0x3F) as u16) << 4) | (chunk[2] as u16 >> 4);
        let v3 = (((chunk[2] & 0x0F) as u16) << 6) | (chunk[3] as u16 >> 2);
        let v4 = (((chunk[3] & 0x03) as u16) << 8) | chunk[4] as u16;
        flat[4 * i] = v1;
        flat[4 * i + 1] = v2;
        flat[4 * i + 2] = v3;
        flat[4 * i + 3] = v4;
    }
    let mut sweeps = [[0u16; FAST_HSK_CHANNELS_PER_SWEEP]; FAST_HSK_SWEEP_COUNT];
    for (sweep, chunk) in sweeps.iter_mut().zip(flat.chunks_exact(FAST_HSK_CHANNELS_PER_SWEEP)) {
        sweep.copy_from_slice(chunk);
    }
    sweeps
}

/// Re-pack 7 sweeps of 48 channels (each value must fit in 10 bits)
/// back into the 420-byte fast-HSK block, the inverse of
/// [`decode_fast`].
pub fn pack_fast(
    sweeps: &[[u16; FAST_HSK_CHANNELS_PER_SWEEP]; FAST_HSK_SWEEP_COUNT],
) -> [u8; FAST_HSK_LEN] {
    let mut flat = [0u16; FAST_HSK_SWEEP_COUNT * FAST_HSK_CHANNELS_PER_SWEEP];
    for (chunk, sweep) in flat.chunks_exact_mut(FAST_HSK_CHANNELS_PER_SWEEP).zip(sweeps.iter()) {
        chunk.copy_from_slice(sweep);
    }

    let mut bytes = [0u8; FAST_HSK_LEN];
    for (chunk, quad) in bytes.chunks_exact_mut(5).zip(flat.chunks_exact(4)) {
        let (v1, v2, v3, v4) = (quad[0], quad[1], quad[2], quad[3]);
        chunk[0] = (v1 >> 2) as u8;
        chunk[1] = (((v1 & 0x3) << 6) | (v2 >> 4)) as u8;
        chunk[2] = (((v2 & 0xF) << 4) | (v3 >> 6)) as u8;
        chunk[3] = (((v3 & 0x3F) << 2) | (v4 >> 8)) as u8;
        chunk[4] = (v4 & 0xFF) as u8;
    }
    bytes
}

/// A fully decoded housekeeping record: the slow bitfield sweep plus
/// the reshaped fast-HSK channel readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HousekeepingFrame {
    pub slow: SlowHousekeeping,
    pub fast: [[u16; FAST_HSK_CHANNELS_PER_SWEEP]; FAST_HSK_SWEEP_COUNT],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_hsk_field_offsets() {
        let mut bytes = [0u8; SLOW_HSK_LEN];
        bytes[0] = 7; // flight mode
        bytes[1] = 0xAB; // fsw version
        bytes[2] = 0b1000_0001; // flash + high_voltage
        let hsk = decode_slow(&bytes);
        assert_eq!(hsk.flight_mode, 7);
        assert_eq!(hsk.fsw_version_high, 0xA);
        assert_eq!(hsk.fsw_version_low, 0xB);
        assert!(hsk.device_enable.flash);
        assert!(hsk.device_enable.high_voltage);
        assert!(!hsk.device_enable.mag);
    }

    #[test]
    fn fast_hsk_splits_five_bytes_into_four_values() {
        let mut bytes = [0u8; FAST_HSK_LEN];
        bytes[0..5].copy_from_slice(&[0xFF, 0xC0, 0x00, 0x00, 0x00]);
        let sweeps = decode_fast(&bytes);
        // first 10-bit value: top 8 bits from byte0, top 2 bits from byte1
        assert_eq!(sweeps[0][0], 0x3FF);
        assert_eq!(sweeps[0][1], 0);
    }

    #[test]
    fn fast_hsk_reshapes_into_seven_sweeps_of_48() {
        let bytes = [0u8; FAST_HSK_LEN];
        let sweeps = decode_fast(&bytes);
        assert_eq!(sweeps.len(), FAST_HSK_SWEEP_COUNT);
        assert_eq!(sweeps[0].len(), FAST_HSK_CHANNELS_PER_SWEEP);
    }

    #[test]
    fn fast_hsk_round_trips_through_pack_and_decode() {
        let mut sweeps = [[0u16; FAST_HSK_CHANNELS_PER_SWEEP]; FAST_HSK_SWEEP_COUNT];
        let mut counter: u32 = 0;
        for sweep in sweeps.iter_mut() {
            for v in sweep.iter_mut() {
                *v = (counter % 1024) as u16;
                counter = counter.wrapping_add(37);
            }
        }
        let packed = pack_fast(&sweeps);
        assert_eq!(packed.len(), FAST_HSK_LEN);
        assert_eq!(decode_fast(&packed), sweeps);
    }

    #[test]
    fn decode_then_pack_reproduces_original_block() {
        let mut bytes = [0u8; FAST_HSK_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i * 7 + 3) as u8;
        }
        let sweeps = decode_fast(&bytes);
        assert_eq!(pack_fast(&sweeps), bytes);
    }
}
