use super::AssetId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceClass {
    Spreadsheet,
    Xml,
    Pdf,
    Txt,
}

impl SourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceClass::Spreadsheet => "spreadsheet",
            SourceClass::Xml => "xml",
            SourceClass::Pdf => "pdf",
            SourceClass::Txt => "txt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossVerdictClass {
    Consistent,
    Acceptable,
    Inconsistent,
    SingleSource,
    NoData,
}

impl CrossVerdictClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossVerdictClass::Consistent => "CONSISTENT",
            CrossVerdictClass::Acceptable => "ACCEPTABLE",
            CrossVerdictClass::Inconsistent => "INCONSISTENT",
            CrossVerdictClass::SingleSource => "SINGLE_SOURCE",
            CrossVerdictClass::NoData => "NO_DATA",
        }
    }

    /// §4.F / §9: only INCONSISTENT and CONSISTENT/ACCEPTABLE participate
    /// in streak bookkeeping; SINGLE_SOURCE and NO_DATA never do.
    pub fn participates_in_streak(&self) -> bool {
        !matches!(self, CrossVerdictClass::SingleSource | CrossVerdictClass::NoData)
    }
}

/// Up to one observed value per source class for a (asset, date, window,
/// metric) group (§3). `None` means that source did not report the metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceValues {
    pub spreadsheet: Option<f64>,
    pub xml: Option<f64>,
    pub pdf: Option<f64>,
    pub txt: Option<f64>,
}

impl SourceValues {
    pub fn get(&self, class: SourceClass) -> Option<f64> {
        match class {
            SourceClass::Spreadsheet => self.spreadsheet,
            SourceClass::Xml => self.xml,
            SourceClass::Pdf => self.pdf,
            SourceClass::Txt => self.txt,
        }
    }

    pub fn present(&self) -> Vec<(SourceClass, f64)> {
        [
            SourceClass::Spreadsheet,
            SourceClass::Xml,
            SourceClass::Pdf,
            SourceClass::Txt,
        ]
        .into_iter()
        .filter_map(|c| self.get(c).map(|v| (c, v)))
        .collect()
    }
}

/// Per `(asset, business_date, time_window, metric)` (§4.F). `time_window`
/// distinguishes hourly comparison slots from the single daily slot within
/// the same business date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossVerdict {
    pub id: Option<i64>,
    pub asset_id: AssetId,
    pub business_date: NaiveDate,
    pub time_window: String,
    pub metric_key: String,
    pub values: SourceValues,
    pub max_absolute_deviation: Option<f64>,
    pub max_relative_deviation_pct: Option<f64>,
    pub applied_tolerance: Option<f64>,
    pub classification: CrossVerdictClass,
}

impl CrossVerdict {
    /// Classifies a set of observed values per the §4.F rule: compares the
    /// spread against a tolerance computed from `tolerance_abs`/`tolerance_pct`
    /// of the maximum observed magnitude.
    pub fn classify(values: &SourceValues, tolerance_abs: f64, tolerance_pct: f64) -> Self
    where
        Self: Sized,
    {
        let present = values.present();
        let (classification, max_abs, max_pct, tolerance) = match present.len() {
            0 => (CrossVerdictClass::NoData, None, None, None),
            1 => (CrossVerdictClass::SingleSource, None, None, None),
            _ => {
                let nums: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
                let max_val = nums.iter().cloned().fold(f64::MIN, f64::max);
                let min_val = nums.iter().cloned().fold(f64::MAX, f64::min);
                let spread = max_val - min_val;
                let reference = max_val;
                let tau = (tolerance_abs).max(reference.abs() * tolerance_pct / 100.0);
                let pct = if reference.abs() > 1e-9 {
                    spread / reference.abs() * 100.0
                } else {
                    0.0
                };
                let class = if spread == 0.0 {
                    CrossVerdictClass::Consistent
                } else if spread <= tau {
                    CrossVerdictClass::Acceptable
                } else {
                    CrossVerdictClass::Inconsistent
                };
                (class, Some(spread), Some(pct), Some(tau))
            }
        };
        CrossVerdict {
            id: None,
            asset_id: 0,
            business_date: chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            time_window: String::new(),
            metric_key: String::new(),
            values: values.clone(),
            max_absolute_deviation: max_abs,
            max_relative_deviation_pct: max_pct,
            applied_tolerance: tolerance,
            classification,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_cross_classification_acceptable() {
        let values = SourceValues {
            spreadsheet: Some(500.0),
            xml: Some(500.5),
            pdf: Some(500.4),
            txt: None,
        };
        let verdict = CrossVerdict::classify(&values, 0.0, 0.5);
        assert_eq!(verdict.classification.as_str(), "ACCEPTABLE");
    }

    #[test]
    fn all_equal_is_consistent() {
        let values = SourceValues {
            spreadsheet: Some(10.0),
            xml: Some(10.0),
            pdf: None,
            txt: None,
        };
        let verdict = CrossVerdict::classify(&values, 0.0, 0.5);
        assert_eq!(verdict.classification.as_str(), "CONSISTENT");
    }

    #[test]
    fn single_source_never_participates() {
        let values = SourceValues {
            spreadsheet: Some(10.0),
            ..Default::default()
        };
        let verdict = CrossVerdict::classify(&values, 0.0, 0.5);
        assert_eq!(verdict.classification.as_str(), "SINGLE_SOURCE");
        assert!(!verdict.classification.participates_in_streak());
    }

    #[test]
    fn no_data_never_participates() {
        let verdict = CrossVerdict::classify(&SourceValues::default(), 0.0, 0.5);
        assert_eq!(verdict.classification.as_str(), "NO_DATA");
        assert!(!verdict.classification.participates_in_streak());
    }
}
