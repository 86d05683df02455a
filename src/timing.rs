//! The timing engine: per-packet quality tagging, block segmentation,
//! an RTC-vs-128Hz-cycle-counter linear fit, and per-sample absolute
//! time interpolation.
//!
//! Currently defined for MAGIC packet streams only (the RTC-fit is
//! only meaningful for a cadence-stable instrument); other instrument
//! kinds would reuse this skeleton with their own cadence constants.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::TimingError;
use crate::magic::InstrumentMode;
use crate::packet::{DecodedPacket, PacketPayload, QualityCode};
use crate::timestamp;

const LOOSE_TOLERANCE_SECONDS: f64 = 300.0;
const TIGHT_TOLERANCE_SECONDS: f64 = 0.1;
const FIT_SLOPE_MIN: f64 = 0.95;
const FIT_SLOPE_MAX: f64 = 1.10;
const FALLBACK_FIT: (f64, f64) = (1.0, -0.001);
const DAY_SECONDS: f64 = 86400.0;

fn packet_increment_seconds(mode: InstrumentMode) -> f64 {
    match mode {
        InstrumentMode::Attitude => 39.0 * (8.0 / 128.0),
        InstrumentMode::ScienceA => 39.0 * (16.0 / 128.0),
        InstrumentMode::Gradiometer => 39.0 * (8.0 / 128.0),
        InstrumentMode::AttitudeConfig | InstrumentMode::Reserved(_) => 0.0,
    }
}

fn per_sample_cycles(mode: InstrumentMode) -> Result<u32, TimingError> {
    match mode {
        InstrumentMode::Attitude => Ok(8),
        InstrumentMode::Gradiometer => Ok(8),
        InstrumentMode::ScienceA => Ok(16),
        other => Err(TimingError::Unsupported { mode: mode_tag(other), mt: 0 }),
    }
}

pub(crate) fn mode_tag(mode: InstrumentMode) -> u8 {
    match mode {
        InstrumentMode::AttitudeConfig => 0,
        InstrumentMode::Attitude => 1,
        InstrumentMode::ScienceA => 2,
        InstrumentMode::Gradiometer => 3,
        InstrumentMode::Reserved(bits) => bits,
    }
}

fn first_sample_mode_mt(packet: &DecodedPacket) -> Option<(InstrumentMode, u8)> {
    match &packet.payload {
        PacketPayload::Magic { samples } => samples.first().map(|s| (s.mode, s.mt())),
        _ => None,
    }
}

/// Mutable view of the length-`2n` quality array: even indices carry
/// per-packet quality, odd indices carry inter-packet-boundary
/// quality.
struct QualityArray(Vec<u8>);

impl QualityArray {
    fn new(n_packets: usize) -> QualityArray {
        let mut q = vec![0u8; 2 * n_packets];
        if let Some(last) = q.last_mut() {
            *last = 20;
        }
        QualityArray(q)
    }

    fn packet(&self, i: usize) -> u8 {
        self.0[2 * i]
    }

    fn set_packet(&mut self, i: usize, value: u8) {
        self.0[2 * i] = value;
    }

    fn set_boundary(&mut self, i: usize, value: u8) {
        // boundary preceding packet i; writes to 2i - 1, retained
        // as-is per the documented off-by-one in this branch.
        if i > 0 {
            self.0[2 * i - 1] = value;
        }
    }
}

/// Split a quality array into maximal runs of packet indices `[s, f)`
/// whose even-indexed (packet) entries are all `<= threshold`.
fn generate_ranges(quality: &[u8], threshold: u8) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut run_end = 0usize;

    for (i, &q) in quality.iter().enumerate() {
        if i % 2 == 0 {
            if q <= threshold {
                if run_start.is_none() {
                    run_start = Some(i / 2);
                }
                run_end = i / 2;
            } else if let Some(s) = run_start.take() {
                ranges.push((s, run_end + 1));
            }
        } else if q > threshold {
            if let Some(s) = run_start.take() {
                ranges.push((s, run_end + 1));
            }
        }
    }
    if let Some(s) = run_start {
        ranges.push((s, run_end + 1));
    }
    ranges
}

/// Ordinary least squares fit of `y = m*x + b`.
fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x) * (x - mean_x);
    }
    if den == 0.0 {
        return FALLBACK_FIT;
    }
    let m = num / den;
    let b = mean_y - m * mean_x;
    (m, b)
}

/// Result of running the timing engine over a contiguous MAGIC packet
/// stream: the full per-packet/per-boundary quality array (exposed so
/// callers and tests can check the sentinel invariant), plus any
/// per-packet timing failures.
pub struct TimingReport {
    pub quality_array: Vec<u8>,
    pub errors: Vec<(usize, TimingError)>,
}

/// Run the timing engine over `packets` in place, filling in
/// `absolute_time` and `quality` on each.
///
/// `year`/`month`/`day` anchor the block's RTC instants to a calendar
/// date -- the RTC itself carries no year, so this must come from the
/// caller (operator input), never a global.
pub fn run_magic_timing(packets: &mut [DecodedPacket], year: i32, month: u32, day: u32) -> TimingReport {
    let n = packets.len();
    let mut quality = QualityArray::new(n);
    let mut errors = Vec::new();

    let mut last_mode: Option<InstrumentMode> = None;
    let mut previous_time: Option<f64> = None;
    let mut rollover_cnt: i64 = 0;
    let mut cycle_seconds = 0.0f64;

    // x_time / y_time are None for packets with a bad timestamp; they
    // are never read back for such packets because generate_ranges
    // excludes them (a bad timestamp always carries QoD=19 > 7).
    let mut x_time: Vec<Option<f64>> = vec![None; n];
    let mut y_time: Vec<Option<f64>> = vec![None; n];

    for i in 0..n {
        let ts = packets[i].packet_timestamp;
        let valid = ts.map(|t| timestamp::validate(&t)).unwrap_or(false);
        if !valid {
            quality.set_packet(i, 19);
        }

        let (mode, _mt) = match first_sample_mode_mt(&packets[i]) {
            Some(m) => m,
            None => {
                // No samples to derive a mode from; nothing further to
                // reconstruct for this packet.
                continue;
            }
        };

        if let Some(prev) = last_mode {
            if prev != mode {
                quality.set_boundary(i, 9);
                previous_time = None;
            }
        }
        last_mode = Some(mode);

        let increment = packet_increment_seconds(mode);

        if !valid {
            continue;
        }

        let (hour, minute, second, centisecond) = ts.expect("valid implies Some").hms_cs();
        let mut current_time = rollover_cnt as f64 * DAY_SECONDS
            + hour as f64 * 3600.0
            + minute as f64 * 60.0
            + second as f64
            + centisecond as f64 * 0.01;

        match previous_time {
            None => {
                x_time[i] = Some(0.0);
                y_time[i] = Some(current_time);
                previous_time = Some(current_time);
            }
            Some(prev) => {
                let mut delta = current_time - prev;

                if current_time <= prev {
                    if ((delta.abs() - DAY_SECONDS).abs()) < LOOSE_TOLERANCE_SECONDS {
                        current_time += DAY_SECONDS;
                        rollover_cnt += 1;
                        delta = current_time - prev;
                    } else {
                        quality.set_packet(i, 19);
                        current_time = prev + increment;
                        delta = current_time - prev;
                    }
                }

                let classify = |f_mult: f64| (f_mult - f_mult.round()).abs() < TIGHT_TOLERANCE_SECONDS;

                let jitter = classify(delta - increment);
                let f_mult = if increment != 0.0 { delta / increment } else { f64::NAN };
                let dropped = increment != 0.0 && classify(f_mult);
                let jittdrop_plus = if increment != 0.0 { (delta + 1.0) / increment } else { f64::NAN };
                let jittdrop_minus = if increment != 0.0 { (delta - 1.0) / increment } else { f64::NAN };
                let jittdrop = increment != 0.0 && (classify(jittdrop_plus) || classify(jittdrop_minus));

                if jitter {
                    cycle_seconds += increment;
                } else if dropped {
                    quality.set_packet(i, 3);
                    cycle_seconds += increment * f_mult.round();
                } else if jittdrop {
                    quality.set_packet(i, 3);
                    let chosen = if classify(jittdrop_plus) { jittdrop_plus } else { jittdrop_minus };
                    cycle_seconds += increment * chosen.round();
                } else {
                    quality.set_boundary(i, 19);
                    cycle_seconds += increment;
                }

                x_time[i] = Some(cycle_seconds);
                y_time[i] = Some(current_time);
                previous_time = Some(current_time);
            }
        }
    }

    let blocks = generate_ranges(&quality.0, 7);
    let epoch: DateTime<Utc> = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single().expect("valid calendar date");

    for (s, f) in blocks {
        let c_time: Vec<f64> = (s..f).map(|i| x_time[i].expect("block entries have a valid timestamp")).collect();
        let r_time: Vec<f64> = (s..f).map(|i| y_time[i].expect("block entries have a valid timestamp")).collect();
        let first_timestamp = r_time[0];
        let diffs: Vec<f64> = r_time.iter().map(|t| t - first_timestamp).collect();

        let sub_blocks = generate_ranges(&quality.0[2 * s..2 * f], 2);
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for (bs, bf) in sub_blocks {
            xs.extend_from_slice(&c_time[bs..bf]);
            ys.extend_from_slice(&diffs[bs..bf]);
        }

        let (m, b) = if xs.len() > 1 { linear_fit(&xs, &ys) } else { FALLBACK_FIT };

        if !(FIT_SLOPE_MIN..=FIT_SLOPE_MAX).contains(&m) {
            for i in s..f {
                quality.set_packet(i, 17);
            }
        }

        for i in s..f {
            let (mode, mt) = match first_sample_mode_mt(&packets[i]) {
                Some(v) => v,
                None => continue,
            };

            if mt == 1 {
                errors.push((i, TimingError::Unsupported { mode: mode_tag(mode), mt: 1 }));
                continue;
            }

            let cycles_per_sample = match per_sample_cycles(mode) {
                Ok(c) => c,
                Err(e) => {
                    errors.push((i, e));
                    continue;
                }
            };

            let sample_count = packets[i].sample_count();
            let mut absolute_time = Vec::with_capacity(sample_count);
            let mut cycles_elapsed = 0u32;
            for _ in 0..sample_count {
                let cycle_time = c_time[i - s] + cycles_elapsed as f64 / 128.0;
                let dt = m * cycle_time + b;
                let fit_time = epoch + Duration::microseconds((first_timestamp * 1_000_000.0) as i64)
                    + Duration::microseconds((dt * 1_000_000.0) as i64);
                absolute_time.push(fit_time);
                cycles_elapsed += cycles_per_sample;
            }
            packets[i].absolute_time = absolute_time;
        }
    }

    for (i, packet) in packets.iter_mut().enumerate() {
        packet.quality = QualityCode(quality.packet(i));
    }

    TimingReport { quality_array: quality.0, errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_ranges_splits_on_threshold() {
        let quality = [0, 0, 0, 0, 20, 0, 0, 20];
        let ranges = generate_ranges(&quality, 7);
        assert_eq!(ranges, vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn linear_fit_recovers_exact_slope() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 1.0, 2.0, 3.0];
        let (m, b) = linear_fit(&xs, &ys);
        assert!((m - 1.0).abs() < 1e-9);
        assert!(b.abs() < 1e-9);
    }

    #[test]
    fn linear_fit_falls_back_on_degenerate_input() {
        let xs = [5.0, 5.0, 5.0];
        let ys = [1.0, 2.0, 3.0];
        let (m, b) = linear_fit(&xs, &ys);
        assert_eq!((m, b), FALLBACK_FIT);
    }
}
