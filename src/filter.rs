//! Filter selections and the filtered view.
//!
//! Each dimension is an independent predicate and a record is kept only when
//! every predicate holds. Conjunction is commutative, so the order in which
//! dimensions are checked never changes the view; [`Dimension::matches`] is
//! public so each predicate can be exercised on its own.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::models::{AuditRecord, CellValue, Dataset};

pub const WILDCARD: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    #[default]
    All,
    Value(String),
}

impl Selector {
    pub fn value(value: impl Into<String>) -> Self {
        Selector::Value(value.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(WILDCARD) {
            Ok(Selector::All)
        } else {
            Ok(Selector::Value(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "{WILDCARD}"),
            Selector::Value(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    Month,
    Week,
    Stage,
    Parameter,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Year,
        Dimension::Month,
        Dimension::Week,
        Dimension::Stage,
        Dimension::Parameter,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Year => "year",
            Dimension::Month => "month",
            Dimension::Week => "week",
            Dimension::Stage => "stage",
            Dimension::Parameter => "parameter",
        }
    }

    pub fn matches(self, selector: &Selector, record: &AuditRecord) -> bool {
        let Selector::Value(wanted) = selector else {
            return true;
        };
        match self {
            Dimension::Year => record
                .year_labels()
                .any(|year| year_matches(wanted, Some(year))),
            Dimension::Month => record.month.as_deref() == Some(wanted.as_str()),
            Dimension::Week => week_matches(wanted, &record.week),
            Dimension::Stage => record.recruitment_stage.as_deref() == Some(wanted.as_str()),
            Dimension::Parameter => record.parameter.as_deref() == Some(wanted.as_str()),
        }
    }
}

/// Relaxed year match: exact, or the record's year contains the filter's
/// numeric suffix once a literal `FY` prefix is stripped (`FY24` vs `24`).
pub fn year_matches(wanted: &str, year: Option<&str>) -> bool {
    let Some(year) = year else {
        return false;
    };
    if year == wanted {
        return true;
    }
    let suffix = wanted.strip_prefix("FY").unwrap_or(wanted).trim();
    !suffix.is_empty() && year.contains(suffix)
}

/// Loose week equality: numeric when both sides parse, textual otherwise.
pub fn week_matches(wanted: &str, week: &CellValue) -> bool {
    let Some(actual) = week.as_text() else {
        return false;
    };
    let wanted = wanted.trim();
    match (wanted.parse::<f64>(), actual.parse::<f64>()) {
        (Ok(left), Ok(right)) => left == right,
        _ => wanted == actual,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub year: Selector,
    pub month: Selector,
    pub week: Selector,
    pub stage: Selector,
    pub parameter: Selector,
}

impl FilterState {
    pub fn selector(&self, dimension: Dimension) -> &Selector {
        match dimension {
            Dimension::Year => &self.year,
            Dimension::Month => &self.month,
            Dimension::Week => &self.week,
            Dimension::Stage => &self.stage,
            Dimension::Parameter => &self.parameter,
        }
    }

    /// Returns a new state with one dimension replaced.
    pub fn with(&self, dimension: Dimension, selector: Selector) -> Self {
        let mut next = self.clone();
        match dimension {
            Dimension::Year => next.year = selector,
            Dimension::Month => next.month = selector,
            Dimension::Week => next.week = selector,
            Dimension::Stage => next.stage = selector,
            Dimension::Parameter => next.parameter = selector,
        }
        next
    }

    pub fn is_unfiltered(&self) -> bool {
        Dimension::ALL
            .iter()
            .all(|dimension| self.selector(*dimension).is_all())
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.matches_in_order(record, &Dimension::ALL)
    }

    /// Same predicate as [`FilterState::matches`], checked in a caller-chosen order.
    pub fn matches_in_order(&self, record: &AuditRecord, order: &[Dimension]) -> bool {
        order
            .iter()
            .all(|dimension| dimension.matches(self.selector(*dimension), record))
    }

    pub fn describe(&self) -> String {
        if self.is_unfiltered() {
            return "all records".to_string();
        }
        Dimension::ALL
            .iter()
            .filter_map(|dimension| match self.selector(*dimension) {
                Selector::All => None,
                Selector::Value(value) => Some(format!("{}={value}", dimension.label())),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The records that survive the current filters, in dataset order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilteredView {
    pub records: Vec<AuditRecord>,
}

impl FilteredView {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

pub fn apply(filters: &FilterState, dataset: &Dataset) -> FilteredView {
    FilteredView {
        records: dataset
            .records
            .iter()
            .filter(|record| filters.matches(record))
            .cloned()
            .collect(),
    }
}

/// Position of a month label within the financial year; unknown labels sort
/// after every real month.
pub fn month_sort_key(label: &str, fiscal_start: Month) -> (u32, String) {
    let name: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match Month::from_str(&name) {
        Ok(month) => {
            let offset = (month.number_from_month() + 12 - fiscal_start.number_from_month()) % 12;
            (offset, String::new())
        }
        Err(_) => (12, label.to_string()),
    }
}

/// Distinct values per dimension, as offered in the selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub months: Vec<String>,
    pub weeks: Vec<String>,
    pub stages: Vec<String>,
    pub parameters: Vec<String>,
}

impl FilterOptions {
    pub fn from_dataset(dataset: &Dataset, fiscal_start: Month) -> Self {
        let collect = |field: fn(&AuditRecord) -> Option<String>| -> Vec<String> {
            let mut values: Vec<String> = Vec::new();
            for record in &dataset.records {
                if let Some(value) = field(record) {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
            }
            values
        };

        let mut months = collect(|record| record.month.clone());
        months.sort_by_key(|month| month_sort_key(month, fiscal_start));

        let mut weeks = collect(|record| record.week.as_text());
        weeks.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(left), Ok(right)) => left.total_cmp(&right),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.cmp(b),
        });

        let mut stages = collect(|record| record.recruitment_stage.clone());
        stages.sort();
        let mut parameters = collect(|record| record.parameter.clone());
        parameters.sort();

        Self {
            years: dataset.financial_years.clone(),
            months,
            weeks,
            stages,
            parameters,
        }
    }
}
