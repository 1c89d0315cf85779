//! Stateless electrical formulas used by every pipeline stage.

use serde::{Deserialize, Serialize};

use crate::domain::{CableSpec, PhaseType, DEFAULT_IMPEDANCE_OHMS};

// Environmental derating
const TEMPERATURE_DERATE_THRESHOLD_C: f64 = 40.0;
const TEMPERATURE_DERATE_PER_C: f64 = 0.02;
const ALTITUDE_DERATE_PER_1000_FT: f64 = 0.04;
const FEET_PER_METER: f64 = 3.28084;

// Power factor floor so kVA conversions never divide by zero
const MIN_POWER_FACTOR: f64 = 0.01;

/// SPL loss relative to 1 m for the distances the rig editor offers (m, dB)
const DISTANCE_LOSS_TABLE: [(f64, f64); 3] = [(1.0, 0.0), (10.0, 20.0), (50.0, 34.0)];

fn clamp_pf(power_factor: f64) -> f64 {
    if power_factor.is_finite() {
        power_factor.clamp(MIN_POWER_FACTOR, 1.0)
    } else {
        1.0
    }
}

/// Real power from apparent power
pub fn kva_to_watts(kva: f64, power_factor: f64) -> f64 {
    kva * 1000.0 * clamp_pf(power_factor)
}

/// Apparent power from real power
pub fn watts_to_kva(watts: f64, power_factor: f64) -> f64 {
    watts / 1000.0 / clamp_pf(power_factor)
}

/// Apparent power (VA) drawn for a real load
pub fn apparent_power_va(watts: f64, power_factor: f64) -> f64 {
    watts / clamp_pf(power_factor)
}

/// Single-conductor resistance of a cable run (Ω)
pub fn cable_resistance_ohms(cable: &CableSpec) -> f64 {
    match *cable {
        CableSpec::None => 0.0,
        CableSpec::Awg { gauge, length_ft } => {
            // mΩ over the run, then Ω
            let milliohms = gauge.milliohms_per_kft() * length_ft.max(0.0) / 1000.0;
            milliohms / 1000.0
        }
        CableSpec::Manual { milliohms } => milliohms.max(0.0) / 1000.0,
    }
}

/// Capacity multiplier for ambient temperature: 1.0 up to 40 °C, then −2 % per °C
pub fn temperature_derate(ambient_c: f64) -> f64 {
    if ambient_c <= TEMPERATURE_DERATE_THRESHOLD_C {
        return 1.0;
    }
    (1.0 - (ambient_c - TEMPERATURE_DERATE_THRESHOLD_C) * TEMPERATURE_DERATE_PER_C).max(0.0)
}

/// Capacity multiplier for altitude: −4 % per 1000 ft above sea level
pub fn altitude_derate(altitude_m: f64) -> f64 {
    if altitude_m <= 0.0 {
        return 1.0;
    }
    let feet = altitude_m * FEET_PER_METER;
    (1.0 - feet / 1000.0 * ALTITUDE_DERATE_PER_1000_FT).max(0.0)
}

/// Capacity multiplier for a user safety margin in percent
pub fn user_derate(percent: f64) -> f64 {
    (1.0 - percent / 100.0).clamp(0.0, 1.0)
}

/// Losses on a cable run carrying a given load
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeederLoss {
    pub resistance_ohms: f64,
    pub current_a: f64,
    pub power_loss_watts: f64,
    pub voltage_drop: f64,
    /// Informational; downstream loads are not re-derated by it
    pub voltage_at_distro: f64,
}

impl FeederLoss {
    pub fn voltage_drop_percent(&self, supply_voltage: f64) -> f64 {
        percent_of(self.voltage_drop, supply_voltage)
    }
}

/// Current, I²R loss and voltage drop for `load_watts` through `resistance_ohms`
pub fn feeder_loss(load_watts: f64, voltage: f64, phase: PhaseType, resistance_ohms: f64) -> FeederLoss {
    let denominator = voltage * phase.current_factor();
    if !(denominator > 0.0) {
        return FeederLoss {
            resistance_ohms,
            ..FeederLoss::default()
        };
    }
    let current_a = load_watts.max(0.0) / denominator;
    let voltage_drop = current_a * resistance_ohms;
    FeederLoss {
        resistance_ohms,
        current_a,
        power_loss_watts: current_a * current_a * resistance_ohms,
        voltage_drop,
        voltage_at_distro: (voltage - voltage_drop).max(0.0),
    }
}

/// `n` identical loads in parallel
pub fn parallel_impedance(z_ohms: f64, n: u32) -> f64 {
    if n == 0 {
        return DEFAULT_IMPEDANCE_OHMS;
    }
    z_ohms / n as f64
}

/// One group of identical parallel loads on a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadBranch {
    pub impedance_ohms: f64,
    pub cable_ohms: f64,
    pub quantity: u32,
}

/// Net impedance of all branches in parallel, default 8 Ω when nothing conducts
pub fn effective_impedance(branches: &[LoadBranch]) -> f64 {
    let conductance: f64 = branches
        .iter()
        .filter_map(|b| {
            let z = b.impedance_ohms + b.cable_ohms;
            (z > 0.0).then(|| b.quantity as f64 / z)
        })
        .sum();
    if conductance > 0.0 {
        1.0 / conductance
    } else {
        DEFAULT_IMPEDANCE_OHMS
    }
}

/// SPL loss relative to 1 m (dB)
pub fn distance_loss_db(distance_m: f64) -> f64 {
    DISTANCE_LOSS_TABLE
        .iter()
        .find(|(d, _)| (d - distance_m).abs() < f64::EPSILON)
        .map(|&(_, loss)| loss)
        .unwrap_or_else(|| 20.0 * distance_m.max(1.0).log10())
}

/// Estimated SPL of an array of `quantity` cabinets each receiving `power_watts`
///
/// `None` when there is no power or no cabinet to sum.
pub fn spl_sum(
    sensitivity_db: f64,
    power_watts: f64,
    quantity: u32,
    array_summation_factor: f64,
    distance_m: f64,
) -> Option<f64> {
    if !(power_watts > 0.0) || quantity == 0 {
        return None;
    }
    let array_gain = 3.0 * (quantity as f64).log2() * array_summation_factor;
    Some(sensitivity_db + 10.0 * power_watts.log10() + array_gain - distance_loss_db(distance_m))
}

/// `value / capacity × 100`, 0 for a zero/negative capacity or a non-finite result
pub fn percent_of(value: f64, capacity: f64) -> f64 {
    if !(capacity > 0.0) {
        return 0.0;
    }
    let percent = value / capacity * 100.0;
    if percent.is_finite() {
        percent
    } else {
        0.0
    }
}

/// Convert dB to a power ratio
pub fn db_to_power_ratio(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AwgGauge;
    use proptest::prelude::*;
    use strum::IntoEnumIterator;
    use rstest::rstest;

    #[test]
    fn test_kva_round_trip_with_pf_clamp() {
        assert!((kva_to_watts(10.0, 0.8) - 8000.0).abs() < 1e-9);
        assert!((watts_to_kva(8000.0, 0.8) - 10.0).abs() < 1e-9);
        // pf floored at 0.01
        assert!((kva_to_watts(1.0, 0.0) - 10.0).abs() < 1e-9);
        assert!((kva_to_watts(1.0, 2.0) - 1000.0).abs() < 1e-9);
    }

    #[rstest]
    #[case(CableSpec::None, 0.0)]
    #[case(CableSpec::manual(250.0), 0.25)]
    #[case(CableSpec::awg(AwgGauge::Awg10, 100.0), 0.0999)]
    #[case(CableSpec::awg(AwgGauge::Awg4_0, 1000.0), 0.049)]
    fn test_cable_resistance(#[case] cable: CableSpec, #[case] ohms: f64) {
        assert!((cable_resistance_ohms(&cable) - ohms).abs() < 1e-9);
    }

    #[test]
    fn test_awg_run_matches_manual_milliohms() {
        // 1000 ft of any gauge is exactly its table value in mΩ
        for gauge in AwgGauge::iter() {
            let awg = cable_resistance_ohms(&CableSpec::awg(gauge, 1000.0));
            let manual = cable_resistance_ohms(&CableSpec::manual(gauge.milliohms_per_kft()));
            assert!((awg - manual).abs() < 1e-12, "{gauge}");
        }
        let short = cable_resistance_ohms(&CableSpec::awg(AwgGauge::Awg12, 50.0));
        assert!((short - 1588.0 * 50.0 / 1000.0 / 1000.0).abs() < 1e-12);
    }

    #[rstest]
    #[case(25.0, 1.0)]
    #[case(40.0, 1.0)]
    #[case(50.0, 0.8)]
    #[case(65.0, 0.5)]
    #[case(120.0, 0.0)]
    fn test_temperature_derate(#[case] celsius: f64, #[case] factor: f64) {
        assert!((temperature_derate(celsius) - factor).abs() < 1e-9);
    }

    #[rstest]
    #[case(-50.0, 1.0)]
    #[case(0.0, 1.0)]
    #[case(304.8, 0.96)]
    #[case(1000.0, 1.0 - 3.28084 * 0.04)]
    #[case(100_000.0, 0.0)]
    fn test_altitude_derate(#[case] meters: f64, #[case] factor: f64) {
        assert!((altitude_derate(meters) - factor).abs() < 1e-6);
    }

    #[test]
    fn test_feeder_loss_single_phase() {
        let loss = feeder_loss(2300.0, 230.0, PhaseType::Single, 0.5);
        assert!((loss.current_a - 10.0).abs() < 1e-9);
        assert!((loss.voltage_drop - 5.0).abs() < 1e-9);
        assert!((loss.power_loss_watts - 50.0).abs() < 1e-9);
        assert!((loss.voltage_at_distro - 225.0).abs() < 1e-9);
    }

    #[test]
    fn test_feeder_loss_three_phase_uses_root_three() {
        let loss = feeder_loss(3f64.sqrt() * 400.0 * 10.0, 400.0, PhaseType::Three, 0.1);
        assert!((loss.current_a - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_feeder_loss_guards_zero_voltage() {
        let loss = feeder_loss(1000.0, 0.0, PhaseType::Single, 1.0);
        assert_eq!(loss.current_a, 0.0);
        assert_eq!(loss.voltage_at_distro, 0.0);
    }

    #[test]
    fn test_voltage_at_distro_floors_at_zero() {
        let loss = feeder_loss(100_000.0, 120.0, PhaseType::Single, 10.0);
        assert_eq!(loss.voltage_at_distro, 0.0);
    }

    #[test]
    fn test_effective_impedance_default_when_empty() {
        assert_eq!(effective_impedance(&[]), DEFAULT_IMPEDANCE_OHMS);
        let zero = LoadBranch { impedance_ohms: 8.0, cable_ohms: 0.0, quantity: 0 };
        assert_eq!(effective_impedance(&[zero]), DEFAULT_IMPEDANCE_OHMS);
    }

    #[test]
    fn test_effective_impedance_includes_cable() {
        let branch = LoadBranch { impedance_ohms: 8.0, cable_ohms: 0.5, quantity: 1 };
        assert!((effective_impedance(&[branch]) - 8.5).abs() < 1e-9);
    }

    #[rstest]
    #[case(1.0, 0.0)]
    #[case(10.0, 20.0)]
    #[case(50.0, 34.0)]
    fn test_distance_table(#[case] meters: f64, #[case] loss: f64) {
        assert_eq!(distance_loss_db(meters), loss);
    }

    #[test]
    fn test_distance_off_table_uses_inverse_square() {
        assert!((distance_loss_db(20.0) - 26.0206).abs() < 1e-3);
    }

    #[test]
    fn test_spl_sum() {
        // 98 dB + 30 dB (1 kW) + 6 dB (4 cabinets) at 1 m
        let spl = spl_sum(98.0, 1000.0, 4, 1.0, 1.0).unwrap();
        assert!((spl - 134.0).abs() < 1e-9);
        // array summation disabled, 10 m
        let spl = spl_sum(98.0, 1000.0, 4, 0.0, 10.0).unwrap();
        assert!((spl - 108.0).abs() < 1e-9);
        assert!(spl_sum(98.0, 0.0, 1, 1.0, 1.0).is_none());
        assert!(spl_sum(98.0, 100.0, 0, 1.0, 1.0).is_none());
    }

    #[rstest]
    #[case(50.0, 0.0)]
    #[case(50.0, -10.0)]
    #[case(f64::INFINITY, 10.0)]
    #[case(50.0, f64::NAN)]
    fn test_percent_of_guards(#[case] value: f64, #[case] capacity: f64) {
        assert_eq!(percent_of(value, capacity), 0.0);
    }

    proptest! {
        #[test]
        fn prop_parallel_identical_loads(z in 0.5f64..64.0, n in 1u32..16) {
            let branch = LoadBranch { impedance_ohms: z, cable_ohms: 0.0, quantity: n };
            let expected = parallel_impedance(z, n);
            prop_assert!((effective_impedance(&[branch]) - expected).abs() < 1e-9);
            prop_assert!((expected - z / n as f64).abs() < 1e-12);
        }

        #[test]
        fn prop_derates_stay_in_unit_interval(t in -40.0f64..200.0, alt in -500.0f64..20_000.0) {
            let td = temperature_derate(t);
            let ad = altitude_derate(alt);
            prop_assert!((0.0..=1.0).contains(&td));
            prop_assert!((0.0..=1.0).contains(&ad));
        }
    }
}
