//! Turns resolved sheets into the canonical [`Dataset`].

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::fields::{audit, FieldSpec};
use crate::models::{AuditRecord, CellValue, Dataset, Row, Sheet};
use crate::sheets::ResolvedSheets;

/// Raw column holding the financial year on the Audit Count sheet.
pub const FINANCIAL_YEAR_COLUMN: usize = 1;

/// Lenient numeric coercion applied to every numeric field.
///
/// Audit exports mix numbers, numeric text, percentages and junk in the same
/// column. Anything that does not parse counts as zero; this never fails.
pub fn to_number_or_zero(value: &CellValue) -> f64 {
    let number = match value {
        CellValue::Empty => 0.0,
        CellValue::Bool(flag) => {
            if *flag {
                1.0
            } else {
                0.0
            }
        }
        CellValue::Number(number) => *number,
        CellValue::Text(text) => {
            let cleaned = text.trim().trim_end_matches('%').trim().replace(',', "");
            cleaned.parse::<f64>().unwrap_or(0.0)
        }
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

pub fn normalize(resolved: ResolvedSheets) -> Dataset {
    let financial_years = financial_years_from_raw(&resolved.audit_count.rows);
    let records = build_records(&resolved.audit_count);

    info!(
        sheet = %resolved.audit_count.name,
        records = records.len(),
        years = financial_years.len(),
        "normalized audit count sheet"
    );

    let rows_of = |sheet: Option<Sheet>| -> Vec<Row> {
        sheet
            .map(|sheet| sheet.data_records().cloned().collect())
            .unwrap_or_default()
    };

    let dataset = Dataset {
        upload_id: Uuid::new_v4(),
        ingested_at: Utc::now(),
        records,
        financial_years,
        yearly: resolved.yearly,
        recruiter_rows: rows_of(resolved.recruiter_wise),
        exception_rows: rows_of(resolved.error_log),
        rca_capa_rows: rows_of(resolved.rca_capa),
        six_sigma_rows: rows_of(resolved.six_sigma),
        warnings: resolved.warnings,
    };

    debug!(
        yearly = dataset.yearly.len(),
        recruiter_rows = dataset.recruiter_rows.len(),
        rca_capa_rows = dataset.rca_capa_rows.len(),
        six_sigma_rows = dataset.six_sigma_rows.len(),
        exception_rows = dataset.exception_rows.len(),
        "retained auxiliary sheets"
    );

    dataset
}

/// Distinct financial years from raw column 1, header skipped, sorted.
pub fn financial_years_from_raw(rows: &[Vec<CellValue>]) -> Vec<String> {
    let mut years: Vec<String> = Vec::new();
    for row in rows.iter().skip(1) {
        let Some(year) = row.get(FINANCIAL_YEAR_COLUMN).and_then(CellValue::as_text) else {
            continue;
        };
        if !years.contains(&year) {
            years.push(year);
        }
    }
    years.sort();
    years
}

fn build_records(sheet: &Sheet) -> Vec<AuditRecord> {
    sheet
        .records
        .iter()
        .enumerate()
        .filter(|(_, row)| row.values().any(|value| !value.is_blank()))
        .map(|(idx, row)| {
            let raw_year = sheet
                .rows
                .get(idx + 1)
                .and_then(|raw| raw.get(FINANCIAL_YEAR_COLUMN))
                .and_then(CellValue::as_text);
            record_from_row(row, raw_year)
        })
        .collect()
}

/// Builds one record; `raw_year` is the aligned raw column 1 value, used when
/// the parsed row has no financial-year column of its own.
pub fn record_from_row(row: &Row, raw_year: Option<String>) -> AuditRecord {
    let text = |spec: FieldSpec| spec.text(row);
    let number = |spec: FieldSpec| spec.number(row);

    AuditRecord {
        financial_year: text(audit::FINANCIAL_YEAR).or_else(|| raw_year.clone()),
        raw_financial_year: raw_year,
        month: text(audit::MONTH),
        week: audit::WEEK.lookup(row).cloned().unwrap_or_default(),
        recruitment_stage: text(audit::STAGE),
        parameter: text(audit::PARAMETER),
        recruiter_name: text(audit::RECRUITER),
        program_manager: text(audit::PROGRAM_MANAGER),
        opportunity_count: number(audit::OPPORTUNITY_COUNT),
        opportunity_pass: number(audit::OPPORTUNITY_PASS),
        opportunity_fail: number(audit::OPPORTUNITY_FAIL),
        opportunity_na: number(audit::OPPORTUNITY_NA),
        opportunity_excluding_na: audit::OPPORTUNITY_EXCLUDING_NA.stored_number(row),
        total_population: number(audit::TOTAL_POPULATION),
        sample_count: number(audit::SAMPLE_COUNT),
    }
}
