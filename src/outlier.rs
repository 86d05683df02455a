//! Iterated Median Absolute Deviation (MAD) outlier rejection, used
//! by the timing engine to sanity-check a block's interpolated times
//! before trusting them as a timestamp source.

use chrono::{DateTime, Duration, Utc};

const MAD_CONSTANT: f64 = 0.6745;
const MAX_ITERATIONS: usize = 5;

/// One round of the iterative reduction, recorded for callers that
/// want to inspect (or log) how the estimate converged rather than
/// just the final outlier set.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationStep {
    pub iteration: usize,
    pub estimate: DateTime<Utc>,
    pub deviation: Duration,
    pub subset_size: usize,
}

/// Result of [`detect_outliers`]: which input indices were rejected,
/// and the full convergence trace.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub outlier_indices: Vec<usize>,
    pub trace: Vec<IterationStep>,
}

fn to_epoch_seconds(dt: DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 * 1e-9
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaNs in timestamp deltas"));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Median and Median Absolute Deviation of a set of timestamps,
/// expressed as an estimate datetime and a deviation duration.
fn calc_dt_median_mad(subset: &[DateTime<Utc>]) -> (DateTime<Utc>, Duration) {
    let deltas: Vec<f64> = subset.iter().map(|dt| to_epoch_seconds(*dt)).collect();
    let estimate_seconds = median(&deltas);
    let abs_deviations: Vec<f64> = deltas.iter().map(|d| (d - estimate_seconds).abs() / MAD_CONSTANT).collect();
    let deviation_seconds = median(&abs_deviations);

    let estimate = DateTime::<Utc>::from_timestamp(
        estimate_seconds.floor() as i64,
        ((estimate_seconds.fract()) * 1e9) as u32,
    )
    .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"));
    let deviation = Duration::milliseconds((deviation_seconds * 1000.0) as i64);

    (estimate, deviation)
}

/// Identify outliers in a sparse list of candidate timestamps
/// (`None` marks a sample with no timestamp, e.g. one the timing
/// engine could not interpolate), relative to `tolerance`.
///
/// Iteratively re-estimates the median and MAD of the surviving
/// subset, narrowing to points within one deviation of the estimate,
/// until the deviation falls within tolerance, the subset stops
/// shrinking, or five iterations pass.
pub fn detect_outliers(candidates: &[Option<DateTime<Utc>>], tolerance: Duration) -> OutlierReport {
    let mut subset_indices: Vec<usize> =
        candidates.iter().enumerate().filter_map(|(i, dt)| dt.map(|_| i)).collect();

    let mut trace = Vec::new();
    let mut iteration = 0;
    let mut done = false;

    while !done && iteration < MAX_ITERATIONS {
        let subset: Vec<DateTime<Utc>> =
            subset_indices.iter().map(|&i| candidates[i].expect("index drawn from Some entries")).collect();
        let (estimate, deviation) = calc_dt_median_mad(&subset);

        trace.push(IterationStep { iteration, estimate, deviation, subset_size: subset.len() });

        if deviation > tolerance {
            let new_indices: Vec<usize> = candidates
                .iter()
                .enumerate()
                .filter_map(|(i, dt)| {
                    dt.and_then(|t| if (t - estimate).abs() < deviation { Some(i) } else { None })
                })
                .collect();
            if new_indices.is_empty() {
                done = true;
            } else {
                subset_indices = new_indices;
            }
        } else {
            done = true;
        }
        iteration += 1;
    }

    let outlier_indices: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, dt)| if dt.is_some() && !subset_indices.contains(&i) { Some(i) } else { None })
        .collect();

    OutlierReport { outlier_indices, trace }
}
