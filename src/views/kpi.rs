use std::fmt;

use serde::{Serialize, Serializer};

use crate::aggregate::{ratio, Totals};
use crate::filter::FilteredView;

/// A headline ratio, or an explicit marker that there was nothing to measure.
///
/// `NoData` is distinct from a genuine `Value(0.0)`: an empty view, or one
/// whose denominator is zero, has no accuracy at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Value(f64),
    NoData,
}

impl Metric {
    pub fn from_ratio(numerator: f64, denominator: f64) -> Self {
        if denominator <= 0.0 {
            Metric::NoData
        } else {
            Metric::Value(ratio(numerator, denominator))
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Metric::Value(value) => Some(value),
            Metric::NoData => None,
        }
    }

    pub fn is_no_data(self) -> bool {
        matches!(self, Metric::NoData)
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(value) => serializer.serialize_f64(*value),
            Metric::NoData => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(value) => write!(f, "{value:.1}%"),
            Metric::NoData => write!(f, "no data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    /// Opportunities audited in the view.
    pub total_audits: f64,
    pub totals: Totals,
    pub accuracy: Metric,
    pub error_rate: Metric,
    pub sample_coverage: Metric,
    pub completeness: Metric,
}

impl KpiSummary {
    pub fn has_data(&self) -> bool {
        self.totals.records > 0
    }
}

pub fn build(view: &FilteredView) -> KpiSummary {
    let totals = Totals::from_records(&view.records);
    from_totals(totals)
}

pub fn from_totals(totals: Totals) -> KpiSummary {
    if totals.records == 0 {
        return KpiSummary {
            total_audits: 0.0,
            totals,
            accuracy: Metric::NoData,
            error_rate: Metric::NoData,
            sample_coverage: Metric::NoData,
            completeness: Metric::NoData,
        };
    }

    KpiSummary {
        total_audits: totals.opportunity_count,
        totals,
        accuracy: Metric::from_ratio(totals.opportunity_pass, totals.opportunity_excluding_na),
        error_rate: Metric::from_ratio(totals.opportunity_fail, totals.opportunity_excluding_na),
        sample_coverage: Metric::from_ratio(totals.opportunity_count, totals.total_population),
        completeness: Metric::from_ratio(totals.opportunity_pass, totals.opportunity_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditRecord;

    fn sample_record(pass: f64, fail: f64, count: f64, na: f64) -> AuditRecord {
        AuditRecord {
            recruitment_stage: Some("Intake".to_string()),
            parameter: Some("Form Completeness".to_string()),
            opportunity_pass: pass,
            opportunity_fail: fail,
            opportunity_count: count,
            opportunity_na: na,
            ..AuditRecord::default()
        }
    }

    #[test]
    fn intake_scenario_reports_expected_kpis() {
        let view = FilteredView {
            records: vec![
                sample_record(3.0, 1.0, 4.0, 0.0),
                sample_record(3.0, 0.0, 3.0, 0.0),
                sample_record(2.0, 1.0, 3.0, 0.0),
            ],
        };
        let kpis = build(&view);

        assert_eq!(kpis.total_audits, 10.0);
        assert_eq!(kpis.accuracy, Metric::Value(80.0));
        assert_eq!(kpis.error_rate, Metric::Value(20.0));
        assert_eq!(kpis.completeness, Metric::Value(80.0));
        assert_eq!(kpis.sample_coverage, Metric::NoData);
    }

    #[test]
    fn empty_view_reports_no_data_everywhere() {
        let kpis = build(&FilteredView::default());
        assert!(!kpis.has_data());
        assert!(kpis.accuracy.is_no_data());
        assert!(kpis.error_rate.is_no_data());
        assert!(kpis.sample_coverage.is_no_data());
        assert!(kpis.completeness.is_no_data());
    }

    #[test]
    fn all_na_record_has_no_accuracy() {
        let view = FilteredView {
            records: vec![sample_record(0.0, 0.0, 10.0, 10.0)],
        };
        let kpis = build(&view);
        assert_eq!(kpis.accuracy, Metric::NoData);
        assert_eq!(kpis.error_rate, Metric::NoData);
        assert_eq!(kpis.completeness, Metric::Value(0.0));
    }

    #[test]
    fn building_twice_is_identical() {
        let view = FilteredView {
            records: vec![sample_record(9.0, 1.0, 10.0, 0.0)],
        };
        assert_eq!(build(&view), build(&view));
    }

    #[test]
    fn metric_serializes_no_data_as_null() {
        let json = serde_json::to_string(&[Metric::Value(80.0), Metric::NoData]).unwrap();
        assert_eq!(json, "[80.0,null]");
    }
}
