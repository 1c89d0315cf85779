use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::CrestCurve;

/// Named program-material profile
///
/// Every profile except [`ContentProfile::Custom`] carries a reference crest
/// curve; `Custom` defers to the curve stored in the global settings.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentProfile {
    Speech,
    Acoustic,
    #[default]
    Rock,
    Edm,
    HipHop,
    PinkNoise,
    SineWave,
    Custom,
}

// (frequency Hz, crest dB)
static PROFILE_CURVES: Lazy<HashMap<ContentProfile, CrestCurve>> = Lazy::new(|| {
    ContentProfile::iter()
        .filter_map(|profile| {
            let pairs: &[(f64, f64)] = match profile {
                ContentProfile::Speech => &[(100.0, 12.0), (1000.0, 14.0), (8000.0, 16.0)],
                ContentProfile::Acoustic => &[(50.0, 12.0), (500.0, 14.0), (5000.0, 16.0)],
                ContentProfile::Rock => &[
                    (30.0, 6.0),
                    (100.0, 8.0),
                    (1000.0, 10.0),
                    (10000.0, 12.0),
                ],
                ContentProfile::Edm => &[(30.0, 4.0), (100.0, 6.0), (1000.0, 8.0), (10000.0, 10.0)],
                ContentProfile::HipHop => &[(30.0, 5.0), (100.0, 7.0), (1000.0, 9.0), (10000.0, 11.0)],
                ContentProfile::PinkNoise => &[(20.0, 12.0)],
                ContentProfile::SineWave => &[(20.0, 3.0)],
                ContentProfile::Custom => return None,
            };
            Some((profile, CrestCurve::from_pairs(pairs)))
        })
        .collect()
});

impl ContentProfile {
    /// Reference curve for this profile, `None` for [`ContentProfile::Custom`]
    pub fn reference_curve(&self) -> Option<&'static CrestCurve> {
        PROFILE_CURVES.get(self)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ContentProfile::Custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_named_profile_has_a_curve() {
        for profile in ContentProfile::iter() {
            assert_eq!(profile.reference_curve().is_some(), !profile.is_custom(), "{profile}");
        }
    }

    #[test]
    fn test_profile_curves_stay_in_range() {
        for curve in PROFILE_CURVES.values() {
            assert!(curve
                .points()
                .iter()
                .all(|p| (0.0..=20.0).contains(&p.crest_factor)));
        }
    }

    #[test]
    fn test_profile_names_round_trip() {
        assert_eq!("hip_hop".parse::<ContentProfile>().unwrap(), ContentProfile::HipHop);
        assert_eq!(ContentProfile::PinkNoise.to_string(), "pink_noise");
    }

    #[test]
    fn test_sine_is_flat() {
        let curve = ContentProfile::SineWave.reference_curve().unwrap();
        assert_eq!(curve.crest_at(50.0), curve.crest_at(15_000.0));
    }
}
