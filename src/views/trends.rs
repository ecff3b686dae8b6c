//! Monthly, weekly and year-over-year series plus a short forecast.

use chrono::Month;
use serde::Serialize;

use crate::aggregate::{group_by, mean, Totals};
use crate::config::TrendPolicy;
use crate::fields::yearly;
use crate::filter::{month_sort_key, year_matches, FilterState, FilteredView, Selector};
use crate::models::{format_number, AuditRecord, Dataset, Row, YearlySheet};
use crate::views::kpi::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSource {
    YearlySheets,
    AuditRecords,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub opportunities: f64,
    pub failures: f64,
    pub accuracy: Metric,
    pub error_rate: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: String,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub source: TrendSource,
    pub monthly: Vec<TrendPoint>,
    pub weekly: Vec<TrendPoint>,
    pub by_year: Vec<TrendPoint>,
    pub forecast: Vec<ForecastPoint>,
}

/// Projects future accuracy values from a historical series.
pub trait ForecastStrategy {
    fn project(&self, history: &[f64], horizon: usize) -> Vec<f64>;
}

/// Placeholder projection: the last observed value plus a fixed offset per
/// future period, capped at 100. Not a statistical model.
#[derive(Debug, Clone, PartialEq)]
pub struct StepProjection {
    pub steps: Vec<f64>,
}

impl StepProjection {
    pub fn from_policy(policy: &TrendPolicy) -> Self {
        Self {
            steps: policy.forecast_steps.clone(),
        }
    }
}

impl ForecastStrategy for StepProjection {
    fn project(&self, history: &[f64], horizon: usize) -> Vec<f64> {
        let Some(last) = history.last() else {
            return Vec::new();
        };
        (0..horizon)
            .map(|idx| {
                let step = self
                    .steps
                    .get(idx)
                    .or(self.steps.last())
                    .copied()
                    .unwrap_or(0.0);
                (last + step).clamp(0.0, 100.0)
            })
            .collect()
    }
}

pub fn build(
    dataset: &Dataset,
    view: &FilteredView,
    filters: &FilterState,
    policy: &TrendPolicy,
    forecast: &dyn ForecastStrategy,
) -> Trends {
    let fiscal_start = policy.fiscal_start();
    let yearly_rows = yearly_rows_in_scope(&dataset.yearly, &filters.year);

    let (source, monthly) = if yearly_rows.iter().any(|row| yearly::MONTH.is_present(row)) {
        (
            TrendSource::YearlySheets,
            monthly_from_yearly(&yearly_rows, fiscal_start),
        )
    } else {
        (
            TrendSource::AuditRecords,
            monthly_from_records(&view.records, fiscal_start),
        )
    };

    let history: Vec<f64> = monthly
        .iter()
        .filter_map(|point| point.accuracy.value())
        .collect();
    let forecast = forecast
        .project(&history, policy.forecast_horizon)
        .into_iter()
        .enumerate()
        .map(|(idx, accuracy)| ForecastPoint {
            period: format!("+{}", idx + 1),
            accuracy,
        })
        .collect();

    Trends {
        source,
        monthly,
        weekly: weekly_from_records(&view.records),
        by_year: by_financial_year(&dataset.records),
        forecast,
    }
}

fn yearly_rows_in_scope(sheets: &[YearlySheet], year: &Selector) -> Vec<Row> {
    sheets
        .iter()
        .filter(|sheet| match year {
            Selector::All => true,
            Selector::Value(wanted) => year_matches(wanted, Some(&sheet.label)),
        })
        .flat_map(|sheet| sheet.rows.iter().cloned())
        .collect()
}

fn point_from_totals(period: String, totals: &Totals) -> TrendPoint {
    TrendPoint {
        period,
        opportunities: totals.opportunity_count,
        failures: totals.opportunity_fail,
        accuracy: Metric::from_ratio(totals.opportunity_pass, totals.opportunity_excluding_na),
        error_rate: Metric::from_ratio(totals.opportunity_fail, totals.opportunity_excluding_na),
    }
}

pub fn monthly_from_records(records: &[AuditRecord], fiscal_start: Month) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = group_by(records, |r| r.month.clone())
        .into_iter()
        .map(|(month, group)| point_from_totals(month, &Totals::from_refs(&group)))
        .collect();
    points.sort_by_key(|point| month_sort_key(&point.period, fiscal_start));
    points
}

/// Month series straight from the yearly sheets. Sheets that carry counts are
/// summed; sheets that only carry an accuracy column are averaged.
pub fn monthly_from_yearly(rows: &[Row], fiscal_start: Month) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = group_by(rows, |row| yearly::MONTH.text(row))
        .into_iter()
        .map(|(month, group)| {
            let count: f64 = group.iter().map(|row| yearly::OPPORTUNITY_COUNT.number(row)).sum();
            let pass: f64 = group.iter().map(|row| yearly::OPPORTUNITY_PASS.number(row)).sum();
            let fail: f64 = group.iter().map(|row| yearly::OPPORTUNITY_FAIL.number(row)).sum();
            let na: f64 = group.iter().map(|row| yearly::OPPORTUNITY_NA.number(row)).sum();

            let (accuracy, error_rate) = if count - na > 0.0 {
                (
                    Metric::from_ratio(pass, count - na),
                    Metric::from_ratio(fail, count - na),
                )
            } else {
                let stated: Vec<f64> = group
                    .iter()
                    .filter(|row| yearly::ACCURACY.is_present(row))
                    .map(|row| yearly::ACCURACY.number(row))
                    .collect();
                if stated.is_empty() {
                    (Metric::NoData, Metric::NoData)
                } else {
                    let accuracy = mean(&stated);
                    (Metric::Value(accuracy), Metric::Value(100.0 - accuracy))
                }
            };

            TrendPoint {
                period: month,
                opportunities: count,
                failures: fail,
                accuracy,
                error_rate,
            }
        })
        .collect();
    points.sort_by_key(|point| month_sort_key(&point.period, fiscal_start));
    points
}

pub fn weekly_from_records(records: &[AuditRecord]) -> Vec<TrendPoint> {
    let mut points: Vec<(f64, TrendPoint)> = group_by(records, |r| r.week.as_text())
        .into_iter()
        .map(|(week, group)| {
            let order = week.parse::<f64>().unwrap_or(f64::MAX);
            (order, point_from_totals(week, &Totals::from_refs(&group)))
        })
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.period.cmp(&b.1.period)));
    points.into_iter().map(|(_, point)| point).collect()
}

/// One point per financial year across the whole dataset, ignoring filters.
pub fn by_financial_year(records: &[AuditRecord]) -> Vec<TrendPoint> {
    group_by(records, |r| r.financial_year.clone())
        .into_iter()
        .map(|(year, group)| point_from_totals(year, &Totals::from_refs(&group)))
        .collect()
}

pub fn describe_point(point: &TrendPoint) -> String {
    format!(
        "{}: {} across {} opportunities",
        point.period,
        point.accuracy,
        format_number(point.opportunities)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn sample_record(year: &str, month: &str, week: f64, pass: f64, fail: f64) -> AuditRecord {
        AuditRecord {
            financial_year: Some(year.to_string()),
            month: Some(month.to_string()),
            week: CellValue::Number(week),
            opportunity_pass: pass,
            opportunity_fail: fail,
            opportunity_count: pass + fail,
            ..AuditRecord::default()
        }
    }

    fn yearly_row(month: &str, cells: &[(&str, f64)]) -> Row {
        let mut row = Row::new();
        row.insert("Month".to_string(), CellValue::Text(month.to_string()));
        for (key, value) in cells {
            row.insert(key.to_string(), CellValue::Number(*value));
        }
        row
    }

    #[test]
    fn months_follow_the_financial_year() {
        let key = |label| month_sort_key(label, Month::April);
        assert!(key("April") < key("May"));
        assert!(key("Dec") < key("January"));
        assert!(key("March") < key("Unknown"));
        assert_eq!(key("Apr-24").0, 0);
    }

    #[test]
    fn step_projection_offsets_last_value() {
        let strategy = StepProjection {
            steps: vec![0.5, 0.8, 1.0],
        };
        assert_eq!(strategy.project(&[90.0, 92.0], 4), vec![92.5, 92.8, 93.0, 93.0]);
        assert_eq!(strategy.project(&[99.6], 2), vec![100.0, 100.0]);
        assert!(strategy.project(&[], 3).is_empty());
    }

    #[test]
    fn records_drive_trends_without_yearly_sheets() {
        let dataset = Dataset::from_records(vec![
            sample_record("FY24", "May", 2.0, 9.0, 1.0),
            sample_record("FY24", "April", 1.0, 8.0, 2.0),
            sample_record("FY23", "April", 10.0, 5.0, 5.0),
        ]);
        let view = FilteredView {
            records: dataset.records.clone(),
        };
        let trends = build(
            &dataset,
            &view,
            &FilterState::default(),
            &TrendPolicy::default(),
            &StepProjection::from_policy(&TrendPolicy::default()),
        );

        assert_eq!(trends.source, TrendSource::AuditRecords);
        let months: Vec<&str> = trends.monthly.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(months, vec!["April", "May"]);
        assert_eq!(trends.monthly[0].accuracy, Metric::Value(65.0));
        let weeks: Vec<&str> = trends.weekly.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(weeks, vec!["1", "2", "10"]);
        assert_eq!(trends.by_year.len(), 2);
        assert_eq!(trends.forecast.len(), 3);
        assert_eq!(trends.forecast[0].accuracy, 90.5);
    }

    #[test]
    fn yearly_sheets_take_precedence_for_selected_year() {
        let mut dataset = Dataset::from_records(vec![sample_record("FY24", "April", 1.0, 1.0, 1.0)]);
        dataset.yearly = vec![
            YearlySheet {
                label: "FY23".to_string(),
                sheet_name: "FY23".to_string(),
                rows: vec![yearly_row("April", &[("Accuracy", 70.0)])],
            },
            YearlySheet {
                label: "FY24".to_string(),
                sheet_name: "FY 24".to_string(),
                rows: vec![
                    yearly_row("June", &[("Accuracy", 96.0)]),
                    yearly_row(
                        "April",
                        &[("Opportunity Count", 20.0), ("Pass", 18.0), ("Fail", 2.0)],
                    ),
                ],
            },
        ];
        let filters = FilterState {
            year: Selector::value("FY24"),
            ..FilterState::default()
        };
        let view = FilteredView {
            records: dataset.records.clone(),
        };
        let trends = build(
            &dataset,
            &view,
            &filters,
            &TrendPolicy::default(),
            &StepProjection::from_policy(&TrendPolicy::default()),
        );

        assert_eq!(trends.source, TrendSource::YearlySheets);
        let months: Vec<&str> = trends.monthly.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(months, vec!["April", "June"]);
        assert_eq!(trends.monthly[0].accuracy, Metric::Value(90.0));
        assert_eq!(trends.monthly[1].accuracy, Metric::Value(96.0));
    }
}
