use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(
        "no Audit Count sheet with data found; sheets in this workbook: {}",
        format_sheet_list(.available)
    )]
    MissingRequiredSheet { available: Vec<String> },

    #[error("no dataset has been published yet")]
    NoDataset,

    #[error("snapshot slot is empty")]
    SnapshotEmpty,

    #[error("unsupported workbook source: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook read error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_sheet_list(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sheet_message_lists_available_names() {
        let err = DashboardError::MissingRequiredSheet {
            available: vec!["Summary".to_string(), "FY23".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no Audit Count sheet with data found; sheets in this workbook: Summary, FY23"
        );
    }

    #[test]
    fn missing_sheet_message_handles_empty_workbook() {
        let err = DashboardError::MissingRequiredSheet {
            available: Vec::new(),
        };
        assert!(err.to_string().ends_with("(none)"));
    }
}
