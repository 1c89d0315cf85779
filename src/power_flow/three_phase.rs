//! Per-phase load accounting for generators.
//!
//! Single-phase outlets land on one leg of the supply; three-phase outlets
//! spread their load evenly. A generator can be lightly loaded overall while
//! one leg is close to its limit, so the per-leg split is reported alongside
//! the totals.

use serde::{Deserialize, Serialize};

use crate::domain::PhaseSelector;

/// Load per supply leg (W)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreePhasePower {
    pub l1_w: f64,
    pub l2_w: f64,
    pub l3_w: f64,
}

impl ThreePhasePower {
    pub fn new(l1_w: f64, l2_w: f64, l3_w: f64) -> Self {
        Self { l1_w, l2_w, l3_w }
    }

    /// Place `watts` on the leg(s) an outlet is wired to
    pub fn on_selector(watts: f64, selector: PhaseSelector) -> Self {
        match selector {
            PhaseSelector::L1 => Self::new(watts, 0.0, 0.0),
            PhaseSelector::L2 => Self::new(0.0, watts, 0.0),
            PhaseSelector::L3 => Self::new(0.0, 0.0, watts),
            PhaseSelector::AllPhases => {
                let per_phase = watts / 3.0;
                Self::new(per_phase, per_phase, per_phase)
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.l1_w + self.l2_w + self.l3_w
    }

    pub fn max_phase(&self) -> f64 {
        self.l1_w.max(self.l2_w).max(self.l3_w)
    }

    pub fn min_phase(&self) -> f64 {
        self.l1_w.min(self.l2_w).min(self.l3_w)
    }

    /// 0.0 = perfectly balanced, → 1.0 = everything on one leg
    ///
    /// (max - min) / (max + min + ε)
    pub fn unbalance_factor(&self) -> f64 {
        let max = self.max_phase().abs();
        let min = self.min_phase().abs();
        (max - min) / (max + min + 1e-9)
    }

    pub fn add(&self, other: &ThreePhasePower) -> Self {
        Self {
            l1_w: self.l1_w + other.l1_w,
            l2_w: self.l2_w + other.l2_w,
            l3_w: self.l3_w + other.l3_w,
        }
    }

    /// Collapse onto L1 for single-phase supplies
    pub fn as_single_phase(&self) -> Self {
        Self::new(self.total(), 0.0, 0.0)
    }
}
