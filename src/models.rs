use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single spreadsheet cell as delivered by the workbook parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed display text, or `None` for blank cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(value) => Some(value.to_string()),
            CellValue::Number(value) => Some(format_number(*value)),
            CellValue::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text().unwrap_or_default())
    }
}

/// Renders whole numbers without a trailing `.0` so `24.0` reads as `24`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// One parsed row: header text mapped to the cell beneath it.
pub type Row = BTreeMap<String, CellValue>;

/// A worksheet in both shapes the parser hands over: the raw grid and the
/// header-keyed records. `records[i]` corresponds to `rows[i + 1]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
    #[serde(default)]
    pub records: Vec<Row>,
}

impl Sheet {
    /// Builds the parsed form by promoting the first raw row to keys.
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let records = promote_header(&rows);
        Self {
            name: name.into(),
            rows,
            records,
        }
    }

    /// Parsed rows that carry at least one non-blank cell.
    pub fn data_records(&self) -> impl Iterator<Item = &Row> {
        self.records
            .iter()
            .filter(|row| row.values().any(|value| !value.is_blank()))
    }

    pub fn is_empty(&self) -> bool {
        self.data_records().next().is_none()
    }
}

fn promote_header(rows: &[Vec<CellValue>]) -> Vec<Row> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };

    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let keys: Vec<String> = header
        .iter()
        .map(|cell| {
            let base = cell.as_text().unwrap_or_else(|| "__EMPTY".to_string());
            let count = seen.entry(base.clone()).or_insert(0);
            let key = if *count == 0 {
                base.clone()
            } else {
                format!("{base}_{count}")
            };
            *count += 1;
            key
        })
        .collect();

    body.iter()
        .map(|cells| {
            cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_blank())
                .filter_map(|(idx, cell)| keys.get(idx).map(|key| (key.clone(), cell.clone())))
                .collect()
        })
        .collect()
}

/// Every sheet of an uploaded workbook, in workbook order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSheetSet {
    pub sheets: Vec<Sheet>,
}

impl RawSheetSet {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Companion sheets the resolver looks for besides Audit Count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalSheet {
    YearlyBreakdown,
    RecruiterWise,
    ErrorLog,
    SixSigma,
    RcaCapa,
}

impl OptionalSheet {
    pub fn label(self) -> &'static str {
        match self {
            OptionalSheet::YearlyBreakdown => "yearly breakdown",
            OptionalSheet::RecruiterWise => "recruiter-wise",
            OptionalSheet::ErrorLog => "error/exception",
            OptionalSheet::SixSigma => "Six Sigma",
            OptionalSheet::RcaCapa => "RCA/CAPA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetWarning {
    pub sheet: OptionalSheet,
    pub message: String,
}

/// One audited opportunity-parameter combination from the Audit Count sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Parsed financial-year column, else the raw column value.
    pub financial_year: Option<String>,
    /// Raw column 1 of the Audit Count sheet, which also feeds the year options.
    #[serde(default)]
    pub raw_financial_year: Option<String>,
    pub month: Option<String>,
    pub week: CellValue,
    pub recruitment_stage: Option<String>,
    pub parameter: Option<String>,
    pub recruiter_name: Option<String>,
    pub program_manager: Option<String>,
    pub opportunity_count: f64,
    pub opportunity_pass: f64,
    pub opportunity_fail: f64,
    pub opportunity_na: f64,
    /// As stored in the sheet; `None` when the sheet has no such column.
    pub opportunity_excluding_na: Option<f64>,
    pub total_population: f64,
    pub sample_count: f64,
}

impl AuditRecord {
    /// Every distinct year label this record carries.
    pub fn year_labels(&self) -> impl Iterator<Item = &str> {
        let parsed = self.financial_year.as_deref();
        let raw = self
            .raw_financial_year
            .as_deref()
            .filter(|raw| Some(*raw) != parsed);
        parsed.into_iter().chain(raw)
    }

    /// Opportunities net of NA, preferring the stored column over `count - na`.
    pub fn excluding_na(&self) -> f64 {
        self.opportunity_excluding_na
            .unwrap_or(self.opportunity_count - self.opportunity_na)
    }
}

/// A yearly breakdown sheet, labelled canonically (`FY23`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearlySheet {
    pub label: String,
    pub sheet_name: String,
    pub rows: Vec<Row>,
}

/// Everything ingested from one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub upload_id: Uuid,
    pub ingested_at: DateTime<Utc>,
    pub records: Vec<AuditRecord>,
    pub financial_years: Vec<String>,
    pub yearly: Vec<YearlySheet>,
    pub recruiter_rows: Vec<Row>,
    pub exception_rows: Vec<Row>,
    pub rca_capa_rows: Vec<Row>,
    pub six_sigma_rows: Vec<Row>,
    pub warnings: Vec<SheetWarning>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            upload_id: Uuid::new_v4(),
            ingested_at: Utc::now(),
            records: Vec::new(),
            financial_years: Vec::new(),
            yearly: Vec::new(),
            recruiter_rows: Vec::new(),
            exception_rows: Vec::new(),
            rca_capa_rows: Vec::new(),
            six_sigma_rows: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        Self {
            records,
            ..Self::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    #[test]
    fn header_row_becomes_keys() {
        let sheet = Sheet::from_rows(
            "Audit Count",
            vec![
                vec![text("Stage"), text("FY"), text("Pass")],
                vec![text("Intake"), text("FY24"), CellValue::Number(8.0)],
            ],
        );

        assert_eq!(sheet.records.len(), 1);
        let row = &sheet.records[0];
        assert_eq!(row.get("Stage"), Some(&text("Intake")));
        assert_eq!(row.get("Pass"), Some(&CellValue::Number(8.0)));
    }

    #[test]
    fn duplicate_and_empty_headers_get_suffixes() {
        let sheet = Sheet::from_rows(
            "Sheet",
            vec![
                vec![text("Score"), text("Score"), CellValue::Empty, CellValue::Empty],
                vec![text("a"), text("b"), text("c"), text("d")],
            ],
        );

        let keys: Vec<&String> = sheet.records[0].keys().collect();
        assert_eq!(keys, vec!["Score", "Score_1", "__EMPTY", "__EMPTY_1"]);
    }

    #[test]
    fn blank_rows_keep_alignment_but_are_skipped_as_data() {
        let sheet = Sheet::from_rows(
            "Sheet",
            vec![
                vec![text("Stage")],
                vec![CellValue::Empty],
                vec![text("Offer")],
            ],
        );

        assert_eq!(sheet.records.len(), 2);
        assert_eq!(sheet.data_records().count(), 1);
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(CellValue::Number(24.0).as_text().as_deref(), Some("24"));
        assert_eq!(CellValue::Number(2.5).as_text().as_deref(), Some("2.5"));
        assert_eq!(text("  ").as_text(), None);
    }

    #[test]
    fn stored_exclusion_wins_over_computed() {
        let mut record = AuditRecord {
            opportunity_count: 10.0,
            opportunity_na: 2.0,
            ..AuditRecord::default()
        };
        assert_eq!(record.excluding_na(), 8.0);

        record.opportunity_excluding_na = Some(7.0);
        assert_eq!(record.excluding_na(), 7.0);
    }

    #[test]
    fn cells_deserialize_from_loose_json() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[null, true, 3, "FY24"]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                CellValue::Empty,
                CellValue::Bool(true),
                CellValue::Number(3.0),
                text("FY24"),
            ]
        );
    }
}
