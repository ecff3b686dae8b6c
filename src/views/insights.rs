//! Rule-based findings and recommendations.
//!
//! Each rule looks at the same inputs and decides on its own whether it
//! fires. Rules never see each other's output, so the set of findings does
//! not depend on evaluation order; only the display order is sorted.

use serde::Serialize;

use crate::aggregate::top_n;
use crate::config::{InsightThresholds, NarrativeThresholds};
use crate::filter::FilteredView;
use crate::models::AuditRecord;
use crate::views::kpi::{KpiSummary, Metric};
use crate::views::recruiters::RecruiterBoard;
use crate::views::stages::parameter_stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Positive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightRule {
    AccuracyBand,
    ParameterErrorRate,
    RecruiterErrorShare,
    SampleCoverage,
    RecruiterVariance,
}

impl InsightRule {
    pub const ALL: [InsightRule; 5] = [
        InsightRule::AccuracyBand,
        InsightRule::ParameterErrorRate,
        InsightRule::RecruiterErrorShare,
        InsightRule::SampleCoverage,
        InsightRule::RecruiterVariance,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub rule: InsightRule,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub recommendation: String,
}

/// Everything a rule may look at.
pub struct InsightInputs<'a> {
    pub view: &'a FilteredView,
    pub kpis: &'a KpiSummary,
    pub recruiters: &'a RecruiterBoard,
    pub bands: &'a NarrativeThresholds,
    pub thresholds: &'a InsightThresholds,
}

pub fn build(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    build_in_order(inputs, &InsightRule::ALL)
}

/// Evaluates `rules` in the given order, then sorts by severity and rule.
pub fn build_in_order(inputs: &InsightInputs<'_>, rules: &[InsightRule]) -> Vec<Insight> {
    let mut insights: Vec<Insight> = rules
        .iter()
        .flat_map(|rule| evaluate(*rule, inputs))
        .collect();
    insights.sort_by_key(|insight| (insight.severity, insight.rule));
    insights
}

pub fn evaluate(rule: InsightRule, inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let mut found = match rule {
        InsightRule::AccuracyBand => accuracy_band(inputs),
        InsightRule::ParameterErrorRate => parameter_error_rate(inputs),
        InsightRule::RecruiterErrorShare => recruiter_error_share(inputs),
        InsightRule::SampleCoverage => sample_coverage(inputs),
        InsightRule::RecruiterVariance => recruiter_variance(inputs),
    };
    found.truncate(inputs.thresholds.max_items_per_rule);
    found
}

fn accuracy_band(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let Metric::Value(accuracy) = inputs.kpis.accuracy else {
        return Vec::new();
    };
    let bands = inputs.bands;
    let critical = inputs.thresholds.critical_accuracy;

    let insight = if accuracy < critical {
        Insight {
            rule: InsightRule::AccuracyBand,
            severity: Severity::Critical,
            title: "Accuracy is critically low".to_string(),
            detail: format!("Audit accuracy is {accuracy:.1}%, under the {critical:.0}% floor."),
            recommendation: "Run a root-cause review of the top failing parameters and retrain \
                             the teams involved."
                .to_string(),
        }
    } else if accuracy < bands.below_target {
        Insight {
            rule: InsightRule::AccuracyBand,
            severity: Severity::Warning,
            title: "Accuracy is below target".to_string(),
            detail: format!(
                "Audit accuracy is {accuracy:.1}% against a {:.0}% target.",
                bands.below_target
            ),
            recommendation: "Focus coaching on the parameters with the most failures.".to_string(),
        }
    } else if accuracy >= bands.excellent {
        Insight {
            rule: InsightRule::AccuracyBand,
            severity: Severity::Positive,
            title: "Accuracy is excellent".to_string(),
            detail: format!(
                "Audit accuracy is {accuracy:.1}%, at or above {:.0}%.",
                bands.excellent
            ),
            recommendation: "Capture what is working and share it across teams.".to_string(),
        }
    } else {
        return Vec::new();
    };
    vec![insight]
}

fn parameter_error_rate(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let threshold = inputs.thresholds.parameter_error_rate;
    let records: Vec<&AuditRecord> = inputs.view.records.iter().collect();
    let flagged: Vec<_> = parameter_stats(&records)
        .into_iter()
        .filter(|stat| stat.error_rate > threshold)
        .collect();

    top_n(&flagged, flagged.len(), |a, b| b.error_rate.total_cmp(&a.error_rate))
        .into_iter()
        .map(|stat| Insight {
            rule: InsightRule::ParameterErrorRate,
            severity: Severity::Warning,
            title: format!("High error rate on {}", stat.parameter),
            detail: format!(
                "{} has a {:.1}% error rate ({} failures), above the {threshold:.0}% threshold.",
                stat.parameter,
                stat.error_rate,
                crate::models::format_number(stat.failures)
            ),
            recommendation: format!(
                "Review the checklist and guidance for {} with the audited teams.",
                stat.parameter
            ),
        })
        .collect()
}

fn recruiter_error_share(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let threshold = inputs.thresholds.recruiter_error_share;
    let flagged: Vec<_> = inputs
        .recruiters
        .recruiters
        .iter()
        .filter(|stat| stat.error_share > threshold)
        .cloned()
        .collect();

    top_n(&flagged, flagged.len(), |a, b| b.error_share.total_cmp(&a.error_share))
        .into_iter()
        .map(|stat| Insight {
            rule: InsightRule::RecruiterErrorShare,
            severity: Severity::Warning,
            title: format!("{} accounts for a large share of errors", stat.name),
            detail: format!(
                "{} contributes {:.1}% of all failures in scope, above the {threshold:.0}% threshold.",
                stat.name, stat.error_share
            ),
            recommendation: format!("Schedule a one-to-one quality review with {}.", stat.name),
        })
        .collect()
}

fn sample_coverage(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let target = inputs.thresholds.sample_coverage_target;
    match inputs.kpis.sample_coverage {
        Metric::Value(coverage) if coverage < target => vec![Insight {
            rule: InsightRule::SampleCoverage,
            severity: Severity::Info,
            title: "Sample coverage is below target".to_string(),
            detail: format!(
                "Only {coverage:.1}% of the population was audited against a {target:.0}% target."
            ),
            recommendation: "Increase the audit sample size for the coming period.".to_string(),
        }],
        _ => Vec::new(),
    }
}

fn recruiter_variance(inputs: &InsightInputs<'_>) -> Vec<Insight> {
    let board = inputs.recruiters;
    if !board.high_variance {
        return Vec::new();
    }
    vec![Insight {
        rule: InsightRule::RecruiterVariance,
        severity: Severity::Info,
        title: "Recruiter performance is uneven".to_string(),
        detail: format!(
            "Recruiter accuracy averages {:.1}% with a standard deviation of {:.1} points.",
            board.mean_accuracy, board.accuracy_std_dev
        ),
        recommendation: "Pair lower-scoring recruiters with the leaderboard leaders.".to_string(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::kpi;
    use crate::views::recruiters::{RecruiterSource, RecruiterStat};

    fn sample_record(parameter: &str, pass: f64, fail: f64, population: f64) -> AuditRecord {
        AuditRecord {
            parameter: Some(parameter.to_string()),
            opportunity_pass: pass,
            opportunity_fail: fail,
            opportunity_count: pass + fail,
            total_population: population,
            ..AuditRecord::default()
        }
    }

    fn sample_recruiter(name: &str, accuracy: f64, error_share: f64) -> RecruiterStat {
        RecruiterStat {
            name: name.to_string(),
            program_manager: None,
            samples: 20.0,
            passes: 0.0,
            failures: 0.0,
            scored: 20.0,
            accuracy,
            error_share,
        }
    }

    fn sample_board(recruiters: Vec<RecruiterStat>, high_variance: bool) -> RecruiterBoard {
        RecruiterBoard {
            source: RecruiterSource::AuditRecords,
            recruiters,
            leaderboard: Vec::new(),
            recruiter_of_period: None,
            mean_accuracy: 80.0,
            accuracy_std_dev: 12.0,
            high_variance,
            program_managers: Vec::new(),
        }
    }

    fn rules_fired(insights: &[Insight]) -> Vec<InsightRule> {
        insights.iter().map(|insight| insight.rule).collect()
    }

    #[test]
    fn every_firing_rule_is_reported() {
        let view = FilteredView {
            records: vec![
                sample_record("Offer Letter", 6.0, 4.0, 200.0),
                sample_record("Consent", 10.0, 0.0, 200.0),
            ],
        };
        let kpis = kpi::build(&view);
        let board = sample_board(
            vec![
                sample_recruiter("Asha", 60.0, 75.0),
                sample_recruiter("Ben", 95.0, 25.0),
            ],
            true,
        );
        let bands = NarrativeThresholds::default();
        let thresholds = InsightThresholds::default();
        let inputs = InsightInputs {
            view: &view,
            kpis: &kpis,
            recruiters: &board,
            bands: &bands,
            thresholds: &thresholds,
        };

        let insights = build(&inputs);
        assert_eq!(
            rules_fired(&insights),
            vec![
                InsightRule::AccuracyBand,
                InsightRule::ParameterErrorRate,
                InsightRule::RecruiterErrorShare,
                InsightRule::RecruiterErrorShare,
                InsightRule::SampleCoverage,
                InsightRule::RecruiterVariance,
            ]
        );
        assert_eq!(insights[0].severity, Severity::Critical);
        assert!(insights[2].title.starts_with("Asha"));
    }

    #[test]
    fn evaluation_order_does_not_change_findings() {
        let view = FilteredView {
            records: vec![sample_record("Offer Letter", 8.0, 2.0, 0.0)],
        };
        let kpis = kpi::build(&view);
        let board = sample_board(vec![sample_recruiter("Asha", 80.0, 100.0)], false);
        let bands = NarrativeThresholds::default();
        let thresholds = InsightThresholds::default();
        let inputs = InsightInputs {
            view: &view,
            kpis: &kpis,
            recruiters: &board,
            bands: &bands,
            thresholds: &thresholds,
        };

        let mut reversed = InsightRule::ALL;
        reversed.reverse();
        assert_eq!(build(&inputs), build_in_order(&inputs, &reversed));
    }

    #[test]
    fn excellent_accuracy_is_positive_and_listed_last() {
        let view = FilteredView {
            records: vec![sample_record("Consent", 99.0, 1.0, 2000.0)],
        };
        let kpis = kpi::build(&view);
        let board = sample_board(Vec::new(), false);
        let bands = NarrativeThresholds::default();
        let thresholds = InsightThresholds::default();
        let inputs = InsightInputs {
            view: &view,
            kpis: &kpis,
            recruiters: &board,
            bands: &bands,
            thresholds: &thresholds,
        };

        let insights = build(&inputs);
        assert_eq!(
            rules_fired(&insights),
            vec![InsightRule::SampleCoverage, InsightRule::AccuracyBand]
        );
        assert_eq!(insights[1].severity, Severity::Positive);
    }

    #[test]
    fn items_per_rule_are_capped() {
        let view = FilteredView {
            records: vec![
                sample_record("A", 5.0, 5.0, 0.0),
                sample_record("B", 6.0, 4.0, 0.0),
                sample_record("C", 7.0, 3.0, 0.0),
                sample_record("D", 8.0, 2.0, 0.0),
            ],
        };
        let kpis = kpi::build(&view);
        let board = sample_board(Vec::new(), false);
        let bands = NarrativeThresholds::default();
        let thresholds = InsightThresholds {
            max_items_per_rule: 2,
            ..InsightThresholds::default()
        };
        let inputs = InsightInputs {
            view: &view,
            kpis: &kpis,
            recruiters: &board,
            bands: &bands,
            thresholds: &thresholds,
        };

        let flagged = evaluate(InsightRule::ParameterErrorRate, &inputs);
        let titles: Vec<&str> = flagged.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["High error rate on A", "High error rate on B"]);
    }

    #[test]
    fn empty_view_fires_nothing() {
        let view = FilteredView::default();
        let kpis = kpi::build(&view);
        let board = sample_board(Vec::new(), false);
        let bands = NarrativeThresholds::default();
        let thresholds = InsightThresholds::default();
        let inputs = InsightInputs {
            view: &view,
            kpis: &kpis,
            recruiters: &board,
            bands: &bands,
            thresholds: &thresholds,
        };
        assert!(build(&inputs).is_empty());
    }
}
