//! Stage tabs, per-parameter breakdowns and the stage × parameter heatmap.

use serde::Serialize;

use crate::aggregate::{group_by, top_n, Totals};
use crate::config::StagePolicy;
use crate::filter::FilteredView;
use crate::models::AuditRecord;
use crate::views::kpi::Metric;

/// Spellings accepted for a canonical stage name when a stage is selected.
#[derive(Debug, Clone, Copy)]
pub struct StageAlias {
    pub canonical: &'static str,
    pub variants: &'static [&'static str],
}

pub const STAGE_ALIASES: &[StageAlias] = &[
    // Assessment rows are often logged against the interview round itself.
    StageAlias {
        canonical: "Assessment",
        variants: &["Assessment Interview", "Assessment Round", "Assessments"],
    },
    // Sourcing and screening share one tab in most trackers.
    StageAlias {
        canonical: "Sourcing",
        variants: &["Sourcing & Screening", "Source", "Profile Sourcing"],
    },
    StageAlias {
        canonical: "Screening",
        variants: &["Phone Screen", "Pre-Screening", "CV Screening"],
    },
    // Scheduling and feedback capture both count as interview work.
    StageAlias {
        canonical: "Interview",
        variants: &["Interview Scheduling", "Interview Feedback", "Interviews"],
    },
    StageAlias {
        canonical: "Offer",
        variants: &["Offer Release", "Offer Management", "Offer Letter"],
    },
    // Joining formalities are tracked under onboarding.
    StageAlias {
        canonical: "Onboarding",
        variants: &["Joining", "Pre-Onboarding", "Pre-Joining"],
    },
];

/// Whether a record's stage belongs to the selected stage tab: exact match,
/// then case-insensitive containment, then the alias table.
pub fn stage_matches(selected: &str, stage: &str) -> bool {
    let selected = selected.trim();
    let stage = stage.trim();
    if selected.is_empty() || stage.is_empty() {
        return false;
    }
    if selected == stage {
        return true;
    }

    let selected_lower = selected.to_lowercase();
    let stage_lower = stage.to_lowercase();
    if stage_lower.contains(&selected_lower) || selected_lower.contains(&stage_lower) {
        return true;
    }

    STAGE_ALIASES.iter().any(|alias| {
        let names = || std::iter::once(alias.canonical).chain(alias.variants.iter().copied());
        names().any(|name| name.eq_ignore_ascii_case(selected))
            && names().any(|name| name.eq_ignore_ascii_case(stage))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub opportunities: f64,
    pub failures: f64,
    pub accuracy: Metric,
    pub error_rate: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterStat {
    pub parameter: String,
    pub opportunities: f64,
    pub passes: f64,
    pub failures: f64,
    pub accuracy: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageBreakdown {
    pub selected_stage: Option<String>,
    /// Distinct stage values the selection resolved to.
    pub matched_stages: Vec<String>,
    pub stages: Vec<StageSummary>,
    /// Parameters with the most failures first.
    pub top_by_errors: Vec<ParameterStat>,
    /// Parameters with the highest accuracy first.
    pub top_by_accuracy: Vec<ParameterStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub stages: Vec<String>,
    pub parameters: Vec<String>,
    /// Error rate per `[stage][parameter]`; `None` where nothing was audited.
    pub error_rates: Vec<Vec<Option<f64>>>,
}

pub fn stage_summaries(records: &[AuditRecord]) -> Vec<StageSummary> {
    group_by(records, |r| r.recruitment_stage.clone())
        .into_iter()
        .map(|(stage, group)| {
            let totals = Totals::from_refs(&group);
            StageSummary {
                stage,
                opportunities: totals.opportunity_count,
                failures: totals.opportunity_fail,
                accuracy: Metric::from_ratio(totals.opportunity_pass, totals.opportunity_excluding_na),
                error_rate: Metric::from_ratio(
                    totals.opportunity_fail,
                    totals.opportunity_excluding_na,
                ),
            }
        })
        .collect()
}

pub fn parameter_stats(records: &[&AuditRecord]) -> Vec<ParameterStat> {
    group_by(records, |r| r.parameter.clone())
        .into_iter()
        .map(|(parameter, group)| {
            let group: Vec<&AuditRecord> = group.into_iter().copied().collect();
            let totals = Totals::from_refs(&group);
            ParameterStat {
                parameter,
                opportunities: totals.opportunity_count,
                passes: totals.opportunity_pass,
                failures: totals.opportunity_fail,
                accuracy: totals.accuracy(),
                error_rate: totals.error_rate(),
            }
        })
        .collect()
}

pub fn build(view: &FilteredView, selected_stage: Option<&str>, policy: &StagePolicy) -> StageBreakdown {
    let in_scope: Vec<&AuditRecord> = view
        .records
        .iter()
        .filter(|record| match selected_stage {
            None => true,
            Some(selected) => record
                .recruitment_stage
                .as_deref()
                .is_some_and(|stage| stage_matches(selected, stage)),
        })
        .collect();

    let mut matched_stages: Vec<String> = Vec::new();
    if selected_stage.is_some() {
        for record in &in_scope {
            if let Some(stage) = &record.recruitment_stage {
                if !matched_stages.contains(stage) {
                    matched_stages.push(stage.clone());
                }
            }
        }
    }

    let stats = parameter_stats(&in_scope);
    let top_by_errors = top_n(
        &stats
            .iter()
            .filter(|stat| stat.failures > 0.0)
            .cloned()
            .collect::<Vec<_>>(),
        policy.breakdown_size,
        |a, b| {
            b.failures
                .total_cmp(&a.failures)
                .then(b.error_rate.total_cmp(&a.error_rate))
        },
    );
    let top_by_accuracy = top_n(
        &stats
            .iter()
            .filter(|stat| stat.opportunities > 0.0)
            .cloned()
            .collect::<Vec<_>>(),
        policy.breakdown_size,
        |a, b| {
            b.accuracy
                .total_cmp(&a.accuracy)
                .then(b.opportunities.total_cmp(&a.opportunities))
        },
    );

    StageBreakdown {
        selected_stage: selected_stage.map(str::to_string),
        matched_stages,
        stages: stage_summaries(&view.records),
        top_by_errors,
        top_by_accuracy,
    }
}

pub fn heatmap(view: &FilteredView) -> Heatmap {
    let by_stage = group_by(&view.records, |r| r.recruitment_stage.clone());
    let parameters: Vec<String> = group_by(&view.records, |r| r.parameter.clone())
        .into_keys()
        .collect();

    let mut stages = Vec::with_capacity(by_stage.len());
    let mut error_rates = Vec::with_capacity(by_stage.len());
    for (stage, records) in by_stage {
        let by_parameter = group_by(&records, |r| r.parameter.clone());
        let row = parameters
            .iter()
            .map(|parameter| {
                by_parameter.get(parameter).and_then(|group| {
                    let group: Vec<&AuditRecord> = group.iter().map(|r| **r).collect();
                    let totals = Totals::from_refs(&group);
                    Metric::from_ratio(totals.opportunity_fail, totals.opportunity_excluding_na)
                        .value()
                })
            })
            .collect();
        stages.push(stage);
        error_rates.push(row);
    }

    Heatmap {
        stages,
        parameters,
        error_rates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(stage: &str, parameter: &str, pass: f64, fail: f64) -> AuditRecord {
        AuditRecord {
            recruitment_stage: Some(stage.to_string()),
            parameter: Some(parameter.to_string()),
            opportunity_pass: pass,
            opportunity_fail: fail,
            opportunity_count: pass + fail,
            ..AuditRecord::default()
        }
    }

    fn sample_view() -> FilteredView {
        FilteredView {
            records: vec![
                sample_record("Assessment Interview", "Scorecard", 7.0, 3.0),
                sample_record("Assessment", "Panel Mix", 10.0, 0.0),
                sample_record("Offer Release", "Offer Letter", 4.0, 1.0),
                sample_record("Offer Release", "Salary Fitment", 18.0, 2.0),
                sample_record("Onboarding", "Documents", 9.0, 1.0),
            ],
        }
    }

    #[test]
    fn stage_matching_tries_exact_then_containment_then_alias() {
        assert!(stage_matches("Offer", "Offer"));
        assert!(stage_matches("offer", "Offer Release"));
        assert!(stage_matches("Assessment", "Assessment Interview"));
        assert!(stage_matches("Onboarding", "Joining"));
        assert!(stage_matches("Joining", "Pre-Onboarding"));
        assert!(!stage_matches("Offer", "Onboarding"));
        assert!(!stage_matches("", "Offer"));
    }

    #[test]
    fn selected_stage_scopes_parameter_rankings() {
        let breakdown = build(&sample_view(), Some("Offer"), &StagePolicy::default());

        assert_eq!(breakdown.matched_stages, vec!["Offer Release".to_string()]);
        let by_errors: Vec<&str> = breakdown
            .top_by_errors
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        assert_eq!(by_errors, vec!["Salary Fitment", "Offer Letter"]);
        let by_accuracy: Vec<&str> = breakdown
            .top_by_accuracy
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        assert_eq!(by_accuracy, vec!["Salary Fitment", "Offer Letter"]);
        assert_eq!(breakdown.stages.len(), 4);
    }

    #[test]
    fn error_and_accuracy_rankings_differ() {
        let breakdown = build(&sample_view(), Some("Assessment"), &StagePolicy::default());
        let by_errors: Vec<&str> = breakdown
            .top_by_errors
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        let by_accuracy: Vec<&str> = breakdown
            .top_by_accuracy
            .iter()
            .map(|s| s.parameter.as_str())
            .collect();
        assert_eq!(by_errors, vec!["Scorecard"]);
        assert_eq!(by_accuracy, vec!["Panel Mix", "Scorecard"]);
    }

    #[test]
    fn breakdown_size_caps_rankings() {
        let policy = StagePolicy { breakdown_size: 1 };
        let breakdown = build(&sample_view(), None, &policy);
        assert_eq!(breakdown.top_by_errors.len(), 1);
        assert_eq!(breakdown.top_by_errors[0].parameter, "Scorecard");
        assert!(breakdown.matched_stages.is_empty());
    }

    #[test]
    fn heatmap_leaves_unaudited_cells_empty() {
        let map = heatmap(&sample_view());
        assert_eq!(map.stages.len(), 4);
        assert_eq!(map.parameters.len(), 5);
        let offer = map.stages.iter().position(|s| s == "Offer Release").unwrap();
        let letter = map.parameters.iter().position(|p| p == "Offer Letter").unwrap();
        let scorecard = map.parameters.iter().position(|p| p == "Scorecard").unwrap();
        assert_eq!(map.error_rates[offer][letter], Some(20.0));
        assert_eq!(map.error_rates[offer][scorecard], None);
    }
}
