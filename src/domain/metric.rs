//! Phase banks and phases that together index the `ProductionFact` metric
//! vector (§3). Keeping these as enums instead of free-form strings is the
//! "tagged records, not generic maps" redesign note (§9) applied one level
//! deeper: even the metric *names* are structured.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseBank {
    UncorrectedMass,
    CorrectedMass,
    PvtRefMassSc,
    PvtRefVolSc,
    PvtRefMass20c,
    PvtRefVol20c,
}

impl PhaseBank {
    pub const ALL: [PhaseBank; 6] = [
        PhaseBank::UncorrectedMass,
        PhaseBank::CorrectedMass,
        PhaseBank::PvtRefMassSc,
        PhaseBank::PvtRefVolSc,
        PhaseBank::PvtRefMass20c,
        PhaseBank::PvtRefVol20c,
    ];

    /// Canonical lowercase stem used when building a metric key.
    pub fn code(&self) -> &'static str {
        match self {
            PhaseBank::UncorrectedMass => "uncorrected_mass",
            PhaseBank::CorrectedMass => "corrected_mass",
            PhaseBank::PvtRefMassSc => "pvt_ref_mass_sc",
            PhaseBank::PvtRefVolSc => "pvt_ref_vol_sc",
            PhaseBank::PvtRefMass20c => "pvt_ref_mass_20c",
            PhaseBank::PvtRefVol20c => "pvt_ref_vol_20c",
        }
    }

    /// Unit this bank is harmonized to (§4.D): tonnes for mass banks,
    /// standard cubic metres for volume banks.
    pub fn unit(&self) -> &'static str {
        match self {
            PhaseBank::UncorrectedMass
            | PhaseBank::CorrectedMass
            | PhaseBank::PvtRefMassSc
            | PhaseBank::PvtRefMass20c => "t",
            PhaseBank::PvtRefVolSc | PhaseBank::PvtRefVol20c => "sm3",
        }
    }

    /// Coarse tolerance class the cross-validator keys its tolerance table
    /// by (§4.F): all mass banks behave as "mass", volume banks as
    /// "std_volume".
    pub fn tolerance_class(&self) -> &'static str {
        match self.unit() {
            "t" => "mass",
            _ => "std_volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Gas,
    Oil,
    Hc,
    Water,
    Total,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Gas, Phase::Oil, Phase::Hc, Phase::Water, Phase::Total];

    pub fn code(&self) -> &'static str {
        match self {
            Phase::Gas => "gas",
            Phase::Oil => "oil",
            Phase::Hc => "hc",
            Phase::Water => "water",
            Phase::Total => "total",
        }
    }
}

/// Builds the canonical metric key (e.g. `corrected_mass_oil`) used as the
/// grain for `ReconciliationVerdict`, `CrossVerdict`, and the metric map
/// inside `ProductionFact`.
pub fn metric_key(bank: PhaseBank, phase: Phase) -> String {
    format!("{}_{}", bank.code(), phase.code())
}

/// All 30 (bank × phase) metric keys declared by the canonical grain,
/// in a stable order — the Reconciler iterates this list (§4.E).
pub fn all_metric_keys() -> Vec<(PhaseBank, Phase, String)> {
    let mut out = Vec::with_capacity(PhaseBank::ALL.len() * Phase::ALL.len());
    for bank in PhaseBank::ALL {
        for phase in Phase::ALL {
            out.push((bank, phase, metric_key(bank, phase)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_key_is_stable() {
        assert_eq!(
            metric_key(PhaseBank::CorrectedMass, Phase::Oil),
            "corrected_mass_oil"
        );
        assert_eq!(
            metric_key(PhaseBank::PvtRefVol20c, Phase::Total),
            "pvt_ref_vol_20c_total"
        );
    }

    #[test]
    fn all_metric_keys_covers_thirty() {
        assert_eq!(all_metric_keys().len(), 30);
    }

    #[test]
    fn tolerance_class_matches_unit() {
        assert_eq!(PhaseBank::UncorrectedMass.tolerance_class(), "mass");
        assert_eq!(PhaseBank::PvtRefVolSc.tolerance_class(), "std_volume");
    }
}
