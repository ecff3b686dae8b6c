//! Locates the Audit Count sheet and its optional companions by name.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::DashboardError;
use crate::models::{OptionalSheet, RawSheetSet, Sheet, SheetWarning, YearlySheet};

/// Exact labels used for the error/exception sheet.
pub const ERROR_SHEET_LABELS: [&str; 2] = ["Error Sheet", "Exception Sheet"];

#[derive(Debug, Clone)]
pub struct ResolvedSheets {
    pub audit_count: Sheet,
    pub yearly: Vec<YearlySheet>,
    pub recruiter_wise: Option<Sheet>,
    pub error_log: Option<Sheet>,
    pub six_sigma: Option<Sheet>,
    pub rca_capa: Option<Sheet>,
    pub warnings: Vec<SheetWarning>,
}

impl ResolvedSheets {
    /// Sheet names claimed by each role, for diagnostics.
    pub fn matches(&self) -> Vec<(&'static str, String)> {
        let mut matches = vec![("audit count", self.audit_count.name.clone())];
        for yearly in &self.yearly {
            matches.push((OptionalSheet::YearlyBreakdown.label(), yearly.sheet_name.clone()));
        }
        let optional = [
            (OptionalSheet::RecruiterWise, &self.recruiter_wise),
            (OptionalSheet::ErrorLog, &self.error_log),
            (OptionalSheet::SixSigma, &self.six_sigma),
            (OptionalSheet::RcaCapa, &self.rca_capa),
        ];
        for (kind, sheet) in optional {
            if let Some(sheet) = sheet {
                matches.push((kind.label(), sheet.name.clone()));
            }
        }
        matches
    }
}

pub fn resolve(sheets: &RawSheetSet) -> Result<ResolvedSheets, DashboardError> {
    let audit_count = sheets
        .sheets
        .iter()
        .find(|sheet| is_audit_count(&sheet.name))
        .filter(|sheet| !sheet.is_empty())
        .cloned()
        .ok_or_else(|| DashboardError::MissingRequiredSheet {
            available: sheets.names(),
        })?;

    let mut claimed: HashSet<String> = HashSet::new();
    claimed.insert(audit_count.name.clone());

    let recruiter_wise = claim_first(sheets, &mut claimed, is_recruiter_wise);
    let error_log = claim_first(sheets, &mut claimed, is_error_sheet);
    let six_sigma = claim_first(sheets, &mut claimed, is_six_sigma);
    let rca_capa = RCA_PATTERNS
        .iter()
        .find_map(|pattern| claim_first(sheets, &mut claimed, *pattern));

    let yearly: Vec<YearlySheet> = sheets
        .sheets
        .iter()
        .filter(|sheet| !claimed.contains(&sheet.name))
        .filter_map(|sheet| {
            year_label(&sheet.name).map(|label| YearlySheet {
                label,
                sheet_name: sheet.name.clone(),
                rows: sheet.data_records().cloned().collect(),
            })
        })
        .collect();

    let mut warnings = Vec::new();
    if yearly.is_empty() {
        warnings.push(missing(OptionalSheet::YearlyBreakdown));
    }
    if recruiter_wise.is_none() {
        warnings.push(missing(OptionalSheet::RecruiterWise));
    }
    if rca_capa.is_none() {
        warnings.push(missing(OptionalSheet::RcaCapa));
    }
    if error_log.is_none() {
        debug!("no error/exception sheet found");
    }
    if six_sigma.is_none() {
        debug!("no Six Sigma sheet found");
    }
    for warning in &warnings {
        warn!(sheet = warning.sheet.label(), "{}", warning.message);
    }

    Ok(ResolvedSheets {
        audit_count,
        yearly,
        recruiter_wise,
        error_log,
        six_sigma,
        rca_capa,
        warnings,
    })
}

fn claim_first(
    sheets: &RawSheetSet,
    claimed: &mut HashSet<String>,
    matcher: fn(&str) -> bool,
) -> Option<Sheet> {
    let sheet = sheets
        .sheets
        .iter()
        .filter(|sheet| !claimed.contains(&sheet.name))
        .find(|sheet| matcher(&sheet.name))?;
    claimed.insert(sheet.name.clone());
    Some(sheet.clone())
}

fn missing(sheet: OptionalSheet) -> SheetWarning {
    SheetWarning {
        sheet,
        message: format!("optional {} sheet not found; continuing without it", sheet.label()),
    }
}

pub fn is_audit_count(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("audit") && lower.contains("count")
}

pub fn is_recruiter_wise(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("recruiter") && lower.contains("wise")
}

pub fn is_error_sheet(name: &str) -> bool {
    let trimmed = name.trim();
    ERROR_SHEET_LABELS
        .iter()
        .any(|label| trimmed.eq_ignore_ascii_case(label))
}

pub fn is_six_sigma(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("six") && lower.contains("sigma")
}

/// Tried in order; the first pattern that matches any sheet wins, because
/// tracker names drift between uploads.
pub const RCA_PATTERNS: [fn(&str) -> bool; 4] =
    [is_rca_and_capa, is_rca_or, is_bare_rca, is_rca_separated];

fn is_rca_and_capa(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("rca") && lower.contains("capa")
}

fn is_rca_or(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("rca") && lower.contains("or")
}

fn is_bare_rca(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case("rca")
}

fn is_rca_separated(name: &str) -> bool {
    rca_separator_regex().is_match(name)
}

fn rca_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rca[\s\-_/&.]").expect("valid rca pattern"))
}

fn year_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)fy[\s\-_]*(\d{2}(?:\d{2})?)").expect("valid year pattern")
    })
}

/// Canonical `FYnn` label for a sheet name carrying a year token.
pub fn year_label(name: &str) -> Option<String> {
    let captures = year_token_regex().captures(name)?;
    let digits = captures.get(1)?.as_str();
    Some(format!("FY{}", &digits[digits.len() - 2..]))
}
