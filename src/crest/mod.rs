/// Crest Factor Model
///
/// Turns a content profile or a user formula into a frequency → crest factor
/// curve, interpolates it, and aggregates it across a crossover band.

pub mod curve;
pub mod formula;
pub mod profile;

pub use curve::{
    aggregate, interpolate, sample, sample_frequencies, CrestAlgorithm, CrestCurve,
    CrestCurvePoint, DEFAULT_CREST_DB, DEFAULT_SAMPLE_COUNT, MAX_CREST_DB, MIN_CREST_DB,
};
pub use formula::{
    curve_from_formula, parse_curve, Formula, FormulaCurve, FormulaError, RangeWarning,
    REFERENCE_FREQUENCIES,
};
pub use profile::ContentProfile;
