use serde::{Deserialize, Serialize};

use super::ValidationError;
use crate::crest::{ContentProfile, CrestAlgorithm, CrestCurve, DEFAULT_SAMPLE_COUNT};

/// Upper bound on log-spaced samples per crossover band
pub const MAX_FREQUENCY_SAMPLES: usize = 1000;

const SETTINGS_ENTITY: &str = "settings";

/// Rig-wide inputs shared by every pipeline stage
///
/// Passed explicitly into each recalculation; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    /// Ambient temperature (°C)
    pub ambient_temperature_c: f64,
    /// Site altitude above sea level (m)
    pub altitude_m: f64,
    pub content_profile: ContentProfile,
    /// User curve, used when `content_profile` is `custom`
    pub crest_curve: CrestCurve,
    /// Source text of the formula that produced `crest_curve`, if any
    pub crest_formula: Option<String>,
    pub crest_algorithm: CrestAlgorithm,
    /// Scales the +3 dB per doubling of cabinets (0 = no summation)
    pub array_summation_factor: f64,
    /// Listening distance for SPL estimates (m)
    pub spl_reference_distance_m: f64,
    /// Log-spaced intervals sampled per crossover band
    pub frequency_samples: usize,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            ambient_temperature_c: 25.0,
            altitude_m: 0.0,
            content_profile: ContentProfile::default(),
            crest_curve: CrestCurve::flat(8.0),
            crest_formula: None,
            crest_algorithm: CrestAlgorithm::Average,
            array_summation_factor: 1.0,
            spl_reference_distance_m: 1.0,
            frequency_samples: DEFAULT_SAMPLE_COUNT,
        }
    }
}

impl GlobalSettings {
    /// Settings with a user curve in place of a named profile
    pub fn with_custom_curve(curve: CrestCurve) -> Self {
        Self {
            content_profile: ContentProfile::Custom,
            crest_curve: curve,
            ..Self::default()
        }
    }

    /// Curve every stage reads: the profile's reference curve, or the user
    /// curve for `custom`
    pub fn active_curve(&self) -> &CrestCurve {
        self.content_profile
            .reference_curve()
            .unwrap_or(&self.crest_curve)
    }

    /// Validate settings at the ingestion boundary
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("ambientTemperatureC", self.ambient_temperature_c),
            ("altitudeM", self.altitude_m),
            ("arraySummationFactor", self.array_summation_factor),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite {
                    entity: SETTINGS_ENTITY.to_string(),
                    field,
                });
            }
        }

        let distance = self.spl_reference_distance_m;
        if !(distance.is_finite() && distance > 0.0) {
            return Err(ValidationError::OutOfRange {
                entity: SETTINGS_ENTITY.to_string(),
                field: "splReferenceDistanceM",
                range: "(0, inf)",
                value: distance,
            });
        }

        if !(1..=MAX_FREQUENCY_SAMPLES).contains(&self.frequency_samples) {
            return Err(ValidationError::OutOfRange {
                entity: SETTINGS_ENTITY.to_string(),
                field: "frequencySamples",
                range: "[1, 1000]",
                value: self.frequency_samples as f64,
            });
        }

        if self.content_profile.is_custom() && self.crest_curve.is_empty() {
            return Err(ValidationError::EmptyCrestCurve);
        }

        if let Some(p) = self
            .crest_curve
            .points()
            .iter()
            .find(|p| !(p.frequency > 0.0) || !p.crest_factor.is_finite())
        {
            return Err(ValidationError::InvalidCrestPoint {
                frequency: p.frequency,
                crest_factor: p.crest_factor,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_named_profile_overrides_user_curve() {
        let mut settings = GlobalSettings::default();
        settings.content_profile = ContentProfile::SineWave;
        settings.crest_curve = CrestCurve::flat(15.0);
        assert_eq!(settings.active_curve().crest_at(1000.0), 3.0);
    }

    #[test]
    fn test_custom_profile_uses_user_curve() {
        let settings = GlobalSettings::with_custom_curve(CrestCurve::flat(15.0));
        assert_eq!(settings.active_curve().crest_at(1000.0), 15.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = GlobalSettings::default();
        settings.ambient_temperature_c = f64::NAN;
        assert_eq!(
            settings.validate(),
            Err(ValidationError::NonFinite {
                entity: "settings".into(),
                field: "ambientTemperatureC"
            })
        );

        let mut settings = GlobalSettings::default();
        settings.spl_reference_distance_m = 0.0;
        assert!(matches!(
            settings.validate(),
            Err(ValidationError::OutOfRange { field: "splReferenceDistanceM", .. })
        ));

        let settings = GlobalSettings::with_custom_curve(CrestCurve::default());
        assert_eq!(settings.validate(), Err(ValidationError::EmptyCrestCurve));
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(MAX_FREQUENCY_SAMPLES, true)]
    #[case(MAX_FREQUENCY_SAMPLES + 1, false)]
    #[case(4_000_000_000, false)]
    fn test_frequency_samples_bounded(#[case] samples: usize, #[case] ok: bool) {
        let mut settings = GlobalSettings::default();
        settings.frequency_samples = samples;
        let result = settings.validate();
        assert_eq!(result.is_ok(), ok, "{samples}");
        if !ok {
            assert!(matches!(
                result,
                Err(ValidationError::OutOfRange { field: "frequencySamples", .. })
            ));
        }
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: GlobalSettings =
            serde_json::from_str(r#"{"ambientTemperatureC": 50, "crestAlgorithm": "peak"}"#).unwrap();
        assert_eq!(settings.ambient_temperature_c, 50.0);
        assert_eq!(settings.crest_algorithm, CrestAlgorithm::Peak);
        assert_eq!(settings.frequency_samples, 20);
    }
}
