//! Column synonym tables.
//!
//! Source sheets spell the same column many ways across uploads. Each logical
//! field lists its accepted header spellings in priority order; the first key
//! present in a row wins. Exact matches are tried before a case-insensitive
//! pass so a sheet carrying both `Status` and `STATUS` resolves predictably.

use crate::models::{CellValue, Row};
use crate::normalize::to_number_or_zero;

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(name: &'static str, synonyms: &'static [&'static str]) -> Self {
        Self { name, synonyms }
    }

    pub fn lookup<'a>(&self, row: &'a Row) -> Option<&'a CellValue> {
        for key in self.synonyms {
            if let Some(value) = row.get(*key) {
                return Some(value);
            }
        }
        self.synonyms.iter().find_map(|key| {
            row.iter()
                .find(|(candidate, _)| candidate.trim().eq_ignore_ascii_case(key))
                .map(|(_, value)| value)
        })
    }

    pub fn is_present(&self, row: &Row) -> bool {
        self.lookup(row).is_some()
    }

    pub fn text(&self, row: &Row) -> Option<String> {
        self.lookup(row).and_then(CellValue::as_text)
    }

    pub fn number(&self, row: &Row) -> f64 {
        self.lookup(row).map(to_number_or_zero).unwrap_or(0.0)
    }

    /// Number when the column exists, `None` when it does not.
    pub fn stored_number(&self, row: &Row) -> Option<f64> {
        self.lookup(row).map(to_number_or_zero)
    }
}

pub mod audit {
    use super::FieldSpec;

    pub const FINANCIAL_YEAR: FieldSpec =
        FieldSpec::new("financial_year", &["Financial Year", "FY", "Fin Year"]);
    pub const MONTH: FieldSpec = FieldSpec::new("month", &["Month", "Audit Month"]);
    pub const WEEK: FieldSpec = FieldSpec::new("week", &["Week", "Week No", "Week Number", "Wk"]);
    pub const STAGE: FieldSpec =
        FieldSpec::new("recruitment_stage", &["Recruitment Stage", "Stage", "Process Stage"]);
    pub const PARAMETER: FieldSpec =
        FieldSpec::new("parameter", &["Parameter", "Audit Parameter", "Parameters"]);
    pub const RECRUITER: FieldSpec =
        FieldSpec::new("recruiter_name", &["Recruiter Name", "Recruiter", "Recruiter's Name"]);
    pub const PROGRAM_MANAGER: FieldSpec =
        FieldSpec::new("program_manager", &["Program Manager", "Programme Manager", "PM"]);
    pub const OPPORTUNITY_COUNT: FieldSpec = FieldSpec::new(
        "opportunity_count",
        &["Opportunity Count", "Opportunities", "Total Opportunity", "Opportunity"],
    );
    pub const OPPORTUNITY_PASS: FieldSpec =
        FieldSpec::new("opportunity_pass", &["Opportunity Pass", "Pass", "Passed"]);
    pub const OPPORTUNITY_FAIL: FieldSpec =
        FieldSpec::new("opportunity_fail", &["Opportunity Fail", "Fail", "Failed", "Error"]);
    pub const OPPORTUNITY_NA: FieldSpec =
        FieldSpec::new("opportunity_na", &["Opportunity NA", "NA", "N/A", "Opportunity N/A"]);
    pub const OPPORTUNITY_EXCLUDING_NA: FieldSpec = FieldSpec::new(
        "opportunity_excluding_na",
        &[
            "Opportunity Excluding NA",
            "Opportunity Excl NA",
            "Opportunity (Excl NA)",
            "Opportunity Excluding N/A",
        ],
    );
    pub const TOTAL_POPULATION: FieldSpec =
        FieldSpec::new("total_population", &["Total Population", "Population"]);
    pub const SAMPLE_COUNT: FieldSpec =
        FieldSpec::new("sample_count", &["Sample Count", "Samples", "Sample Size", "Sample"]);
}

pub mod recruiter_sheet {
    use super::FieldSpec;

    pub const RECRUITER: FieldSpec =
        FieldSpec::new("recruiter_name", &["Recruiter Name", "Recruiter", "Recruiter's Name"]);
    pub const PROGRAM_MANAGER: FieldSpec =
        FieldSpec::new("program_manager", &["Program Manager", "Programme Manager", "PM"]);
    pub const SCORE: FieldSpec =
        FieldSpec::new("score", &["Audit Score", "Score", "Result", "Audit Result"]);
    pub const FINANCIAL_YEAR: FieldSpec =
        FieldSpec::new("financial_year", &["Financial Year", "FY", "Year"]);
    pub const MONTH: FieldSpec = FieldSpec::new("month", &["Month", "Audit Month"]);
}

pub mod yearly {
    use super::FieldSpec;

    pub const MONTH: FieldSpec = FieldSpec::new("month", &["Month", "Audit Month"]);
    pub const WEEK: FieldSpec = FieldSpec::new("week", &["Week", "Week No", "Week Number", "Wk"]);
    pub const ACCURACY: FieldSpec =
        FieldSpec::new("accuracy", &["Accuracy", "Accuracy %", "Accuracy (%)", "Audit Accuracy"]);
    pub const OPPORTUNITY_COUNT: FieldSpec = super::audit::OPPORTUNITY_COUNT;
    pub const OPPORTUNITY_PASS: FieldSpec = super::audit::OPPORTUNITY_PASS;
    pub const OPPORTUNITY_FAIL: FieldSpec = super::audit::OPPORTUNITY_FAIL;
    pub const OPPORTUNITY_NA: FieldSpec = super::audit::OPPORTUNITY_NA;
}

pub mod project {
    use super::FieldSpec;

    pub const NAME: FieldSpec = FieldSpec::new(
        "name",
        &["Project Name", "Project", "Project Title", "Title", "Name"],
    );
    pub const KIND: FieldSpec = FieldSpec::new(
        "type",
        &["Type", "Project Type", "RCA/CAPA", "Category", "Action Type"],
    );
    pub const STATUS: FieldSpec = FieldSpec::new(
        "status",
        &["Status", "status", "STATUS", "Project Status", "Current Status"],
    );
    pub const PRIORITY: FieldSpec =
        FieldSpec::new("priority", &["Priority", "priority", "PRIORITY", "Project Priority"]);
    pub const OWNER: FieldSpec = FieldSpec::new(
        "owner",
        &["Owner", "Project Owner", "Responsible", "Assigned To", "Lead"],
    );
    pub const ROOT_CAUSE: FieldSpec =
        FieldSpec::new("root_cause", &["Root Cause", "RootCause", "Root Cause Analysis", "Cause"]);
    pub const ACTION: FieldSpec = FieldSpec::new(
        "action",
        &["Corrective Action", "CAPA", "Action", "Preventive Action", "Action Plan"],
    );
    pub const PARAMETER: FieldSpec =
        FieldSpec::new("parameter", &["Parameter", "Audit Parameter", "Impacted Parameter"]);
    pub const TARGET_DATE: FieldSpec =
        FieldSpec::new("target_date", &["Target Date", "Due Date", "Target Closure Date"]);
    pub const PHASE: FieldSpec = FieldSpec::new("phase", &["Phase", "DMAIC Phase", "Stage"]);
    pub const DEFECTS_BEFORE: FieldSpec = FieldSpec::new(
        "defects_before",
        &["Defects Before", "Baseline Defects", "Baseline Defect %", "Before"],
    );
    pub const DEFECTS_AFTER: FieldSpec = FieldSpec::new(
        "defects_after",
        &["Defects After", "Current Defects", "Current Defect %", "After"],
    );
    pub const CYCLE_TIME_BEFORE: FieldSpec = FieldSpec::new(
        "cycle_time_before",
        &["Cycle Time Before", "Baseline Cycle Time", "Baseline TAT"],
    );
    pub const CYCLE_TIME_AFTER: FieldSpec = FieldSpec::new(
        "cycle_time_after",
        &["Cycle Time After", "Current Cycle Time", "Current TAT"],
    );
}

pub mod exception {
    use super::FieldSpec;

    pub const CATEGORY: FieldSpec = FieldSpec::new(
        "category",
        &["Error Type", "Error Category", "Exception Type", "Category", "Parameter"],
    );
    pub const RECRUITER: FieldSpec =
        FieldSpec::new("recruiter_name", &["Recruiter Name", "Recruiter", "Raised Against"]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn first_synonym_present_wins() {
        let row = row(&[
            ("Project Status", CellValue::Text("Closed".to_string())),
            ("Status", CellValue::Text("Open".to_string())),
        ]);
        assert_eq!(project::STATUS.text(&row).as_deref(), Some("Open"));
    }

    #[test]
    fn falls_back_to_case_insensitive_key() {
        let row = row(&[("recruitment stage", CellValue::Text("Offer".to_string()))]);
        assert_eq!(audit::STAGE.text(&row).as_deref(), Some("Offer"));
    }

    #[test]
    fn stored_number_distinguishes_missing_column() {
        let with = row(&[("Opportunity Excluding NA", CellValue::Text("n/a".to_string()))]);
        let without = Row::new();
        assert_eq!(audit::OPPORTUNITY_EXCLUDING_NA.stored_number(&with), Some(0.0));
        assert_eq!(audit::OPPORTUNITY_EXCLUDING_NA.stored_number(&without), None);
        assert_eq!(audit::OPPORTUNITY_COUNT.number(&without), 0.0);
    }
}
