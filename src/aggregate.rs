//! Pure reductions over record sequences.
//!
//! Nothing here keeps state, so every function is safe to call repeatedly
//! (or from several views) over the same immutable slice.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::fields::FieldSpec;
use crate::models::{AuditRecord, Row};

pub fn sum_field<T>(items: &[T], selector: impl Fn(&T) -> f64) -> f64 {
    items
        .iter()
        .map(|item| {
            let value = selector(item);
            if value.is_finite() {
                value
            } else {
                0.0
            }
        })
        .sum()
}

/// Sums an auxiliary-sheet column, coercing each cell leniently.
pub fn sum_row_field(rows: &[Row], field: FieldSpec) -> f64 {
    sum_field(rows, |row| field.number(row))
}

/// Groups items by key. Items whose key is missing or blank are left out
/// rather than collected under an empty group.
pub fn group_by<'a, T>(
    items: &'a [T],
    key: impl Fn(&T) -> Option<String>,
) -> BTreeMap<String, Vec<&'a T>> {
    let mut groups: BTreeMap<String, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        let Some(key) = key(item) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        groups.entry(key.to_string()).or_default().push(item);
    }
    groups
}

/// `numerator / denominator * 100`, or `0` when the denominator is not positive.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let value = numerator / denominator * 100.0;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn accuracy(pass: f64, opportunity_count: f64, opportunity_na: f64) -> f64 {
    ratio(pass, opportunity_count - opportunity_na)
}

pub fn error_rate(fail: f64, opportunity_count: f64, opportunity_na: f64) -> f64 {
    ratio(fail, opportunity_count - opportunity_na)
}

pub fn sample_coverage(opportunity_count: f64, total_population: f64) -> f64 {
    ratio(opportunity_count, total_population)
}

/// Pass over all opportunities, NA included; not the accuracy denominator.
pub fn completeness(pass: f64, opportunity_count: f64) -> f64 {
    ratio(pass, opportunity_count)
}

/// Which form of "opportunities excluding NA" a total should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExclusionBasis {
    /// The stored column where the sheet has one, else `count - na` per record.
    #[default]
    Stored,
    /// Always `count - na`, ignoring any stored column.
    Computed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub records: usize,
    pub opportunity_count: f64,
    pub opportunity_pass: f64,
    pub opportunity_fail: f64,
    pub opportunity_na: f64,
    pub opportunity_excluding_na: f64,
    pub total_population: f64,
    pub sample_count: f64,
}

impl Totals {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        Self::accumulate(records.iter(), ExclusionBasis::default())
    }

    pub fn from_refs(records: &[&AuditRecord]) -> Self {
        Self::accumulate(records.iter().copied(), ExclusionBasis::default())
    }

    pub fn with_basis(records: &[AuditRecord], basis: ExclusionBasis) -> Self {
        Self::accumulate(records.iter(), basis)
    }

    fn accumulate<'a>(
        records: impl Iterator<Item = &'a AuditRecord>,
        basis: ExclusionBasis,
    ) -> Self {
        let finite = |value: f64| if value.is_finite() { value } else { 0.0 };
        records.fold(Self::default(), |mut totals, r| {
            totals.records += 1;
            totals.opportunity_count += finite(r.opportunity_count);
            totals.opportunity_pass += finite(r.opportunity_pass);
            totals.opportunity_fail += finite(r.opportunity_fail);
            totals.opportunity_na += finite(r.opportunity_na);
            totals.opportunity_excluding_na += finite(match basis {
                ExclusionBasis::Stored => r.excluding_na(),
                ExclusionBasis::Computed => r.opportunity_count - r.opportunity_na,
            });
            totals.total_population += finite(r.total_population);
            totals.sample_count += finite(r.sample_count);
            totals
        })
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.opportunity_pass, self.opportunity_excluding_na)
    }

    pub fn error_rate(&self) -> f64 {
        ratio(self.opportunity_fail, self.opportunity_excluding_na)
    }

    pub fn sample_coverage(&self) -> f64 {
        sample_coverage(self.opportunity_count, self.total_population)
    }

    pub fn completeness(&self) -> f64 {
        completeness(self.opportunity_pass, self.opportunity_count)
    }
}

/// Sorts a copy of `items` with `compare` and keeps the first `n`.
///
/// Insertion keeps equal items in input order and, unlike the std sorts,
/// tolerates comparators that are not transitive, such as the near-tie rule.
pub fn top_n<T: Clone>(items: &[T], n: usize, compare: impl Fn(&T, &T) -> Ordering) -> Vec<T> {
    let mut ranked: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let position = ranked
            .iter()
            .position(|existing| compare(item, existing) == Ordering::Less)
            .unwrap_or(ranked.len());
        ranked.insert(position, item.clone());
    }
    ranked.truncate(n);
    ranked
}

/// Something that can be ranked by accuracy with sample volume as tie-breaker.
pub trait Scored {
    fn accuracy(&self) -> f64;
    fn samples(&self) -> f64;
}

/// Higher accuracy first; when two accuracies sit within `margin` points of
/// each other, the larger sample wins.
pub fn compare_accuracy_near_tie<T: Scored>(margin: f64) -> impl Fn(&T, &T) -> Ordering {
    move |a, b| {
        if (a.accuracy() - b.accuracy()).abs() < margin {
            b.samples().total_cmp(&a.samples())
        } else {
            b.accuracy().total_cmp(&a.accuracy())
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N).
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    #[derive(Debug, Clone, PartialEq)]
    struct Entry {
        name: &'static str,
        accuracy: f64,
        samples: f64,
    }

    impl Scored for Entry {
        fn accuracy(&self) -> f64 {
            self.accuracy
        }

        fn samples(&self) -> f64 {
            self.samples
        }
    }

    fn entry(name: &'static str, accuracy: f64, samples: f64) -> Entry {
        Entry {
            name,
            accuracy,
            samples,
        }
    }

    fn sample_record(stage: Option<&str>, pass: f64, fail: f64, count: f64, na: f64) -> AuditRecord {
        AuditRecord {
            recruitment_stage: stage.map(str::to_string),
            opportunity_pass: pass,
            opportunity_fail: fail,
            opportunity_count: count,
            opportunity_na: na,
            ..AuditRecord::default()
        }
    }

    #[test]
    fn ratio_guards_non_positive_denominators() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(5.0, -3.0), 0.0);
        assert_eq!(ratio(0.0, 0.0), 0.0);
        assert!((ratio(1.0, 3.0) - 33.333).abs() < 0.001);
        for numerator in [0.0, 1.0, 7.5, 1e9] {
            for denominator in [-1.0, 0.0, 0.5, 2.0, 1e-3] {
                assert!(ratio(numerator, denominator).is_finite());
            }
        }
    }

    #[test]
    fn kpi_formulas_use_distinct_denominators() {
        assert_eq!(accuracy(8.0, 12.0, 2.0), 80.0);
        assert_eq!(error_rate(2.0, 12.0, 2.0), 20.0);
        assert_eq!(sample_coverage(10.0, 200.0), 5.0);
        assert!((completeness(8.0, 12.0) - 66.666).abs() < 0.001);
    }

    #[test]
    fn group_by_excludes_missing_keys() {
        let records = vec![
            sample_record(Some("Intake"), 1.0, 0.0, 1.0, 0.0),
            sample_record(None, 1.0, 0.0, 1.0, 0.0),
            sample_record(Some("  "), 1.0, 0.0, 1.0, 0.0),
            sample_record(Some("Intake"), 1.0, 0.0, 1.0, 0.0),
        ];
        let groups = group_by(&records, |r| r.recruitment_stage.clone());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["Intake"].len(), 2);
    }

    #[test]
    fn totals_do_not_double_subtract_na() {
        let mut stored = sample_record(None, 6.0, 2.0, 10.0, 2.0);
        stored.opportunity_excluding_na = Some(8.0);
        let computed = sample_record(None, 6.0, 2.0, 10.0, 2.0);

        let totals = Totals::from_records(&[stored.clone(), computed.clone()]);
        assert_eq!(totals.opportunity_excluding_na, 16.0);
        assert_eq!(totals.accuracy(), 75.0);

        stored.opportunity_excluding_na = Some(9.0);
        let stored_basis = Totals::with_basis(&[stored.clone()], ExclusionBasis::Stored);
        let computed_basis = Totals::with_basis(&[stored], ExclusionBasis::Computed);
        assert_eq!(stored_basis.opportunity_excluding_na, 9.0);
        assert_eq!(computed_basis.opportunity_excluding_na, 8.0);
    }

    #[test]
    fn sum_row_field_coerces_cells() {
        let rows: Vec<Row> = ["3", "x", "4.5"]
            .iter()
            .map(|value| {
                let mut row = Row::new();
                row.insert("Pass".to_string(), CellValue::Text(value.to_string()));
                row
            })
            .collect();
        assert_eq!(sum_row_field(&rows, crate::fields::audit::OPPORTUNITY_PASS), 7.5);
    }

    #[test]
    fn top_n_breaks_near_ties_by_samples() {
        let entries = vec![entry("a", 90.05, 12.0), entry("b", 90.0, 40.0), entry("c", 70.0, 90.0)];
        let ranked = top_n(&entries, 2, compare_accuracy_near_tie(0.1));
        let names: Vec<&str> = ranked.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn top_n_is_stable_for_equal_items() {
        let entries = vec![entry("first", 80.0, 10.0), entry("second", 80.0, 10.0)];
        let ranked = top_n(&entries, 5, compare_accuracy_near_tie(0.1));
        assert_eq!(ranked[0].name, "first");
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn standard_deviation_is_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(standard_deviation(&values), 2.0);
        assert_eq!(standard_deviation(&[]), 0.0);
    }
}
