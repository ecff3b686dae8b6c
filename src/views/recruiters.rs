//! Recruiter leaderboard, recruiter of the period and spread of performance.
//!
//! The dedicated recruiter-wise sheet is preferred: one row per audited
//! sample with a binary score. Without it, the Audit Count records are
//! grouped by recruiter instead.

use serde::Serialize;

use crate::aggregate::{
    compare_accuracy_near_tie, group_by, mean, ratio, standard_deviation, top_n, Scored, Totals,
};
use crate::config::RecruiterPolicy;
use crate::fields::recruiter_sheet;
use crate::filter::{year_matches, FilterState, FilteredView, Selector};
use crate::models::{CellValue, Dataset, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecruiterSource {
    RecruiterSheet,
    AuditRecords,
}

/// Outcome of one sample on the recruiter-wise sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleScore {
    Pass,
    Fail,
    NotApplicable,
}

impl SampleScore {
    /// Exactly `1` passes and exactly `0` fails; anything else is NA.
    pub fn from_cell(cell: Option<&CellValue>) -> Self {
        match cell {
            Some(CellValue::Number(value)) if *value == 1.0 => SampleScore::Pass,
            Some(CellValue::Number(value)) if *value == 0.0 => SampleScore::Fail,
            Some(CellValue::Text(text)) => match text.trim() {
                "1" => SampleScore::Pass,
                "0" => SampleScore::Fail,
                _ => SampleScore::NotApplicable,
            },
            _ => SampleScore::NotApplicable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecruiterStat {
    pub name: String,
    pub program_manager: Option<String>,
    pub samples: f64,
    pub passes: f64,
    pub failures: f64,
    /// Denominator of `accuracy`: samples that scored pass or fail.
    pub scored: f64,
    pub accuracy: f64,
    /// This recruiter's failures as a share (%) of all failures in scope.
    pub error_share: f64,
}

impl Scored for RecruiterStat {
    fn accuracy(&self) -> f64 {
        self.accuracy
    }

    fn samples(&self) -> f64 {
        self.samples
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramManagerStat {
    pub name: String,
    pub recruiters: usize,
    pub samples: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecruiterBoard {
    pub source: RecruiterSource,
    pub recruiters: Vec<RecruiterStat>,
    pub leaderboard: Vec<RecruiterStat>,
    pub recruiter_of_period: Option<RecruiterStat>,
    pub mean_accuracy: f64,
    pub accuracy_std_dev: f64,
    pub high_variance: bool,
    pub program_managers: Vec<ProgramManagerStat>,
}

pub fn build(
    dataset: &Dataset,
    view: &FilteredView,
    filters: &FilterState,
    policy: &RecruiterPolicy,
) -> RecruiterBoard {
    let (source, recruiters) = if dataset.recruiter_rows.is_empty() {
        (RecruiterSource::AuditRecords, from_audit_records(view))
    } else {
        let rows = rows_in_scope(&dataset.recruiter_rows, filters);
        (RecruiterSource::RecruiterSheet, from_recruiter_sheet(&rows))
    };

    let ranked: Vec<RecruiterStat> = recruiters
        .iter()
        .filter(|stat| stat.scored > 0.0)
        .cloned()
        .collect();
    let leaderboard = top_n(
        &ranked,
        policy.leaderboard_size,
        compare_accuracy_near_tie(policy.near_tie_margin),
    );
    let recruiter_of_period = recruiter_of_period(&ranked, policy);

    let accuracies: Vec<f64> = ranked.iter().map(|stat| stat.accuracy).collect();
    let accuracy_std_dev = standard_deviation(&accuracies);

    RecruiterBoard {
        source,
        program_managers: program_managers(&recruiters),
        recruiters,
        leaderboard,
        recruiter_of_period,
        mean_accuracy: mean(&accuracies),
        high_variance: accuracies.len() > 1 && accuracy_std_dev > policy.variance_threshold,
        accuracy_std_dev,
    }
}

/// Best recruiter among those with at least `min_samples`, near-ties going to
/// the larger sample.
pub fn recruiter_of_period(stats: &[RecruiterStat], policy: &RecruiterPolicy) -> Option<RecruiterStat> {
    let eligible: Vec<RecruiterStat> = stats
        .iter()
        .filter(|stat| stat.samples >= policy.min_samples && stat.scored > 0.0)
        .cloned()
        .collect();
    top_n(&eligible, 1, compare_accuracy_near_tie(policy.near_tie_margin))
        .into_iter()
        .next()
}

/// Recruiter-sheet rows that agree with the year and month selections. Rows
/// without those columns are kept.
pub fn rows_in_scope(rows: &[Row], filters: &FilterState) -> Vec<Row> {
    rows.iter()
        .filter(|row| match &filters.year {
            Selector::All => true,
            Selector::Value(year) => match recruiter_sheet::FINANCIAL_YEAR.text(row) {
                Some(value) => year_matches(year, Some(&value)),
                None => true,
            },
        })
        .filter(|row| match &filters.month {
            Selector::All => true,
            Selector::Value(month) => recruiter_sheet::MONTH
                .text(row)
                .map_or(true, |value| &value == month),
        })
        .cloned()
        .collect()
}

pub fn from_recruiter_sheet(rows: &[Row]) -> Vec<RecruiterStat> {
    let groups = group_by(rows, |row| recruiter_sheet::RECRUITER.text(row));
    let mut stats: Vec<RecruiterStat> = groups
        .into_iter()
        .map(|(name, rows)| {
            let mut passes = 0.0;
            let mut failures = 0.0;
            for row in &rows {
                match SampleScore::from_cell(recruiter_sheet::SCORE.lookup(row)) {
                    SampleScore::Pass => passes += 1.0,
                    SampleScore::Fail => failures += 1.0,
                    SampleScore::NotApplicable => {}
                }
            }
            let scored = passes + failures;
            RecruiterStat {
                name,
                program_manager: rows
                    .iter()
                    .find_map(|row| recruiter_sheet::PROGRAM_MANAGER.text(row)),
                samples: rows.len() as f64,
                passes,
                failures,
                scored,
                accuracy: ratio(passes, scored),
                error_share: 0.0,
            }
        })
        .collect();
    assign_error_shares(&mut stats);
    stats
}

pub fn from_audit_records(view: &FilteredView) -> Vec<RecruiterStat> {
    let mut stats: Vec<RecruiterStat> = group_by(&view.records, |r| r.recruiter_name.clone())
        .into_iter()
        .map(|(name, group)| {
            let totals = Totals::from_refs(&group);
            RecruiterStat {
                name,
                program_manager: group.iter().find_map(|r| r.program_manager.clone()),
                samples: totals.opportunity_count,
                passes: totals.opportunity_pass,
                failures: totals.opportunity_fail,
                scored: totals.opportunity_excluding_na,
                accuracy: totals.accuracy(),
                error_share: 0.0,
            }
        })
        .collect();
    assign_error_shares(&mut stats);
    stats
}

fn assign_error_shares(stats: &mut [RecruiterStat]) {
    let total_failures: f64 = stats.iter().map(|stat| stat.failures).sum();
    for stat in stats.iter_mut() {
        stat.error_share = ratio(stat.failures, total_failures);
    }
}

fn program_managers(stats: &[RecruiterStat]) -> Vec<ProgramManagerStat> {
    group_by(stats, |stat| stat.program_manager.clone())
        .into_iter()
        .map(|(name, group)| {
            let passes: f64 = group.iter().map(|stat| stat.passes).sum();
            let scored: f64 = group.iter().map(|stat| stat.scored).sum();
            ProgramManagerStat {
                name,
                recruiters: group.len(),
                samples: group.iter().map(|stat| stat.samples).sum(),
                accuracy: ratio(passes, scored),
            }
        })
        .collect()
}
