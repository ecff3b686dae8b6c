use serde::Serialize;

use crate::aggregate::{group_by, ratio, top_n};
use crate::fields::exception;
use crate::models::{Dataset, Row};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionCount {
    pub label: String,
    pub count: usize,
    /// Share (%) of all logged exceptions.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionSummary {
    pub total: usize,
    pub by_category: Vec<ExceptionCount>,
    pub by_recruiter: Vec<ExceptionCount>,
}

pub fn build(dataset: &Dataset) -> ExceptionSummary {
    let rows = &dataset.exception_rows;
    ExceptionSummary {
        total: rows.len(),
        by_category: counts(rows, |row| exception::CATEGORY.text(row)),
        by_recruiter: counts(rows, |row| exception::RECRUITER.text(row)),
    }
}

/// Rows per distinct label, most frequent first. Rows without the label are
/// still part of the total used for `share`.
fn counts(rows: &[Row], label: impl Fn(&Row) -> Option<String>) -> Vec<ExceptionCount> {
    let total = rows.len() as f64;
    let entries: Vec<ExceptionCount> = group_by(rows, label)
        .into_iter()
        .map(|(label, group)| ExceptionCount {
            label,
            count: group.len(),
            share: ratio(group.len() as f64, total),
        })
        .collect();
    top_n(&entries, entries.len(), |a, b| b.count.cmp(&a.count))
}
