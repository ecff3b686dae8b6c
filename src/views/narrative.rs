use serde::Serialize;

use crate::aggregate::{group_by, top_n, Totals};
use crate::config::NarrativeThresholds;
use crate::filter::FilteredView;
use crate::models::AuditRecord;
use crate::views::kpi::{KpiSummary, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    BelowTarget,
    OnTrack,
    Excellent,
}

impl PerformanceBand {
    pub fn classify(accuracy: f64, thresholds: &NarrativeThresholds) -> Self {
        if accuracy < thresholds.below_target {
            PerformanceBand::BelowTarget
        } else if accuracy >= thresholds.excellent {
            PerformanceBand::Excellent
        } else {
            PerformanceBand::OnTrack
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterErrors {
    pub parameter: String,
    pub failures: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub band: Option<PerformanceBand>,
    pub sentences: Vec<String>,
    pub top_error_parameters: Vec<ParameterErrors>,
}

/// Parameters ranked by total failures, most first; parameters without any
/// failure are left out.
pub fn top_error_parameters(records: &[AuditRecord], n: usize) -> Vec<ParameterErrors> {
    let rows: Vec<ParameterErrors> = group_by(records, |r| r.parameter.clone())
        .into_iter()
        .map(|(parameter, group)| {
            let totals = Totals::from_refs(&group);
            ParameterErrors {
                parameter,
                failures: totals.opportunity_fail,
                error_rate: totals.error_rate(),
            }
        })
        .filter(|row| row.failures > 0.0)
        .collect();
    top_n(&rows, n, |a, b| b.failures.total_cmp(&a.failures))
}

pub fn build(view: &FilteredView, kpis: &KpiSummary, thresholds: &NarrativeThresholds) -> Narrative {
    if !kpis.has_data() {
        return Narrative {
            band: None,
            sentences: vec!["No audit data matches the current filters.".to_string()],
            top_error_parameters: Vec::new(),
        };
    }

    let top_errors = top_error_parameters(&view.records, thresholds.top_error_parameters);
    let mut sentences = Vec::new();

    let band = match kpis.accuracy {
        Metric::Value(accuracy) => {
            let band = PerformanceBand::classify(accuracy, thresholds);
            let verdict = match band {
                PerformanceBand::BelowTarget => {
                    format!("below the {:.0}% target", thresholds.below_target)
                }
                PerformanceBand::OnTrack => "within the expected range".to_string(),
                PerformanceBand::Excellent => "an excellent result".to_string(),
            };
            sentences.push(format!(
                "Overall audit accuracy is {accuracy:.1}% across {} opportunities, {verdict}.",
                format_count(kpis.total_audits)
            ));
            Some(band)
        }
        Metric::NoData => {
            sentences.push(format!(
                "All {} audited opportunities were marked NA, so accuracy cannot be measured.",
                format_count(kpis.total_audits)
            ));
            None
        }
    };

    if !top_errors.is_empty() {
        let listed: Vec<String> = top_errors
            .iter()
            .map(|row| format!("{} ({})", row.parameter, format_count(row.failures)))
            .collect();
        sentences.push(format!("Most failures come from {}.", listed.join(", ")));
    }

    if let Metric::Value(error_rate) = kpis.error_rate {
        match kpis.sample_coverage {
            Metric::Value(coverage) => sentences.push(format!(
                "The error rate stands at {error_rate:.1}% with {coverage:.1}% of the population sampled."
            )),
            Metric::NoData => {
                sentences.push(format!("The error rate stands at {error_rate:.1}%."))
            }
        }
    }

    Narrative {
        band,
        sentences,
        top_error_parameters: top_errors,
    }
}

fn format_count(value: f64) -> String {
    crate::models::format_number(value)
}
