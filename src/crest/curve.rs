use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Crest factor used when no curve data is available (dB)
pub const DEFAULT_CREST_DB: f64 = 8.0;

/// Valid crest factor range (dB)
pub const MIN_CREST_DB: f64 = 0.0;
pub const MAX_CREST_DB: f64 = 20.0;

/// Default number of log-spaced intervals sampled across a band
pub const DEFAULT_SAMPLE_COUNT: usize = 20;

/// One point of a frequency → crest factor curve
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrestCurvePoint {
    /// Frequency (Hz, > 0)
    pub frequency: f64,
    /// Crest factor (dB, 0-20)
    pub crest_factor: f64,
}

impl CrestCurvePoint {
    pub fn new(frequency: f64, crest_factor: f64) -> Self {
        Self {
            frequency,
            crest_factor,
        }
    }
}

/// Frequency-sorted crest factor curve
///
/// Points can be supplied in any order; they are kept sorted ascending by
/// frequency. A single point describes a flat curve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "Vec<CrestCurvePoint>", into = "Vec<CrestCurvePoint>")]
pub struct CrestCurve {
    points: Vec<CrestCurvePoint>,
}

impl From<Vec<CrestCurvePoint>> for CrestCurve {
    fn from(mut points: Vec<CrestCurvePoint>) -> Self {
        points.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        Self { points }
    }
}

impl From<CrestCurve> for Vec<CrestCurvePoint> {
    fn from(curve: CrestCurve) -> Self {
        curve.points
    }
}

impl CrestCurve {
    /// Build a curve from `(frequency, crest)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        pairs
            .iter()
            .map(|&(f, c)| CrestCurvePoint::new(f, c))
            .collect::<Vec<_>>()
            .into()
    }

    /// A single-point curve: the same crest factor at every frequency
    pub fn flat(crest_factor: f64) -> Self {
        Self::from_pairs(&[(1000.0, crest_factor)])
    }

    pub fn points(&self) -> &[CrestCurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert a point, replacing any point at the same frequency
    pub fn insert(&mut self, point: CrestCurvePoint) {
        match self
            .points
            .binary_search_by(|p| p.frequency.total_cmp(&point.frequency))
        {
            Ok(idx) => self.points[idx] = point,
            Err(idx) => self.points.insert(idx, point),
        }
    }

    /// Remove the point at `index`. The last remaining point cannot be removed.
    pub fn remove_at(&mut self, index: usize) -> Option<CrestCurvePoint> {
        if self.points.len() <= 1 || index >= self.points.len() {
            return None;
        }
        Some(self.points.remove(index))
    }

    /// Crest factor at `frequency`, see [`interpolate`]
    pub fn crest_at(&self, frequency: f64) -> f64 {
        interpolate(&self.points, frequency)
    }
}

/// Algorithm used to collapse a band of sampled crest factors into one value
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CrestAlgorithm {
    /// Arithmetic mean of the samples
    #[default]
    Average,
    /// Lowest sampled crest (highest energy, conservative)
    Peak,
    /// Highest sampled crest (optimistic)
    Maximum,
    /// Mean weighted by 1/sqrt(f), favouring low frequencies
    RmsWeighted,
}

/// Interpolate a crest factor at `frequency`
///
/// Linear in crest factor against `log10(frequency)` between the two
/// bracketing points. Frequencies outside the curve clamp to the end points.
/// An empty curve yields [`DEFAULT_CREST_DB`].
pub fn interpolate(points: &[CrestCurvePoint], frequency: f64) -> f64 {
    if points.is_empty() {
        return DEFAULT_CREST_DB;
    }

    let sorted_storage;
    let sorted = if points
        .windows(2)
        .all(|w| w[0].frequency <= w[1].frequency)
    {
        points
    } else {
        let mut v = points.to_vec();
        v.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        sorted_storage = v;
        &sorted_storage[..]
    };

    let first = sorted[0];
    let last = sorted[sorted.len() - 1];

    if frequency <= first.frequency {
        return first.crest_factor;
    }
    if frequency >= last.frequency {
        return last.crest_factor;
    }

    for pair in sorted.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if frequency >= lo.frequency && frequency <= hi.frequency {
            let lo_log = lo.frequency.max(f64::MIN_POSITIVE).log10();
            let hi_log = hi.frequency.log10();
            let span = hi_log - lo_log;
            if span <= 0.0 {
                return lo.crest_factor;
            }
            let t = (frequency.log10() - lo_log) / span;
            return lo.crest_factor + t * (hi.crest_factor - lo.crest_factor);
        }
    }

    last.crest_factor
}

/// Log-spaced frequencies from `hpf` to `lpf` inclusive (`intervals + 1` values)
///
/// Both corners are floored at 1 Hz.
pub fn sample_frequencies(hpf: f64, lpf: f64, intervals: usize) -> Vec<f64> {
    let lo = hpf.max(1.0).log10();
    let hi = lpf.max(1.0).log10();
    if intervals == 0 {
        return vec![10f64.powf(lo)];
    }
    (0..=intervals)
        .map(|i| 10f64.powf(lo + (hi - lo) * i as f64 / intervals as f64))
        .collect()
}

/// Crest factors sampled at `intervals + 1` log-spaced points between the corners
pub fn sample(hpf: f64, lpf: f64, curve: &CrestCurve, intervals: usize) -> Vec<f64> {
    sample_frequencies(hpf, lpf, intervals)
        .into_iter()
        .map(|f| curve.crest_at(f))
        .collect()
}

/// Aggregate the crest factor across a band with the given algorithm
///
/// A degenerate band (`hpf >= lpf`) collapses to the crest at `hpf`.
pub fn aggregate(
    hpf: f64,
    lpf: f64,
    curve: &CrestCurve,
    algorithm: CrestAlgorithm,
    intervals: usize,
) -> f64 {
    if hpf >= lpf {
        return curve.crest_at(hpf);
    }

    let frequencies = sample_frequencies(hpf, lpf, intervals);
    let samples: Vec<f64> = frequencies.iter().map(|&f| curve.crest_at(f)).collect();

    match algorithm {
        CrestAlgorithm::Average => samples.iter().sum::<f64>() / samples.len() as f64,
        CrestAlgorithm::Peak => samples.iter().copied().fold(f64::INFINITY, f64::min),
        CrestAlgorithm::Maximum => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        CrestAlgorithm::RmsWeighted => {
            let (weighted, total) = frequencies.iter().zip(&samples).fold(
                (0.0, 0.0),
                |(acc, weight_sum), (&f, &crest)| {
                    let w = 1.0 / f.sqrt();
                    (acc + crest * w, weight_sum + w)
                },
            );
            if total > 0.0 {
                weighted / total
            } else {
                DEFAULT_CREST_DB
            }
        }
    }
}
