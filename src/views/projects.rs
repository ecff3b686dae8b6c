//! RCA/CAPA tracker and Six Sigma project summaries.

use serde::Serialize;

use crate::aggregate::mean;
use crate::fields::project;
use crate::models::{Dataset, Row};
use crate::views::kpi::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectKind {
    Rca,
    Capa,
    Other,
}

impl ProjectKind {
    pub fn classify(kind: Option<&str>) -> Self {
        let Some(kind) = kind else {
            return ProjectKind::Other;
        };
        let kind = kind.to_lowercase();
        if kind.contains("capa") {
            ProjectKind::Capa
        } else if kind.contains("rca") {
            ProjectKind::Rca
        } else {
            ProjectKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Completed,
    Open,
    Pending,
}

impl StatusBucket {
    /// Substring match on the status text; anything unrecognised, or no
    /// status at all, is pending.
    pub fn classify(status: Option<&str>) -> Self {
        let Some(status) = status else {
            return StatusBucket::Pending;
        };
        let status = status.to_lowercase();
        if ["complete", "closed", "done"]
            .iter()
            .any(|word| status.contains(word))
        {
            StatusBucket::Completed
        } else if ["open", "progress", "ongoing"]
            .iter()
            .any(|word| status.contains(word))
        {
            StatusBucket::Open
        } else {
            StatusBucket::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    pub kind: ProjectKind,
    pub status: Option<String>,
    pub bucket: StatusBucket,
    pub priority: Option<String>,
    pub owner: Option<String>,
    pub root_cause: Option<String>,
    pub action: Option<String>,
    pub parameter: Option<String>,
    pub target_date: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub total: usize,
    pub completed: usize,
    pub open: usize,
    pub pending: usize,
}

impl BucketCounts {
    fn add(&mut self, bucket: StatusBucket) {
        self.total += 1;
        match bucket {
            StatusBucket::Completed => self.completed += 1,
            StatusBucket::Open => self.open += 1,
            StatusBucket::Pending => self.pending += 1,
        }
    }

    pub fn from_buckets(buckets: impl IntoIterator<Item = StatusBucket>) -> Self {
        let mut counts = Self::default();
        for bucket in buckets {
            counts.add(bucket);
        }
        counts
    }

    /// Share of projects completed, `NoData` when there are none.
    pub fn completion_rate(&self) -> Metric {
        Metric::from_ratio(self.completed as f64, self.total as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SixSigmaProject {
    pub name: String,
    pub phase: Option<String>,
    pub bucket: StatusBucket,
    pub owner: Option<String>,
    pub defect_reduction: Metric,
    pub cycle_time_reduction: Metric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectPortfolio {
    pub projects: Vec<ProjectEntry>,
    pub rca: BucketCounts,
    pub capa: BucketCounts,
    pub overall: BucketCounts,
    pub six_sigma: Vec<SixSigmaProject>,
    pub six_sigma_counts: BucketCounts,
    pub mean_defect_reduction: Metric,
}

impl ProjectPortfolio {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.six_sigma.is_empty()
    }
}

pub fn build(dataset: &Dataset) -> ProjectPortfolio {
    let projects: Vec<ProjectEntry> = dataset
        .rca_capa_rows
        .iter()
        .enumerate()
        .map(|(idx, row)| project_entry(idx, row))
        .collect();
    let counts_for = |kind: ProjectKind| {
        BucketCounts::from_buckets(
            projects
                .iter()
                .filter(|entry| entry.kind == kind)
                .map(|entry| entry.bucket),
        )
    };

    let six_sigma: Vec<SixSigmaProject> = dataset
        .six_sigma_rows
        .iter()
        .enumerate()
        .map(|(idx, row)| six_sigma_project(idx, row))
        .collect();
    let reductions: Vec<f64> = six_sigma
        .iter()
        .filter_map(|project| project.defect_reduction.value())
        .collect();

    ProjectPortfolio {
        rca: counts_for(ProjectKind::Rca),
        capa: counts_for(ProjectKind::Capa),
        overall: BucketCounts::from_buckets(projects.iter().map(|entry| entry.bucket)),
        six_sigma_counts: BucketCounts::from_buckets(six_sigma.iter().map(|p| p.bucket)),
        mean_defect_reduction: if reductions.is_empty() {
            Metric::NoData
        } else {
            Metric::Value(mean(&reductions))
        },
        projects,
        six_sigma,
    }
}

fn project_name(idx: usize, row: &Row) -> String {
    project::NAME
        .text(row)
        .unwrap_or_else(|| format!("Project {}", idx + 1))
}

pub fn project_entry(idx: usize, row: &Row) -> ProjectEntry {
    let status = project::STATUS.text(row);
    ProjectEntry {
        name: project_name(idx, row),
        kind: ProjectKind::classify(project::KIND.text(row).as_deref()),
        bucket: StatusBucket::classify(status.as_deref()),
        status,
        priority: project::PRIORITY.text(row),
        owner: project::OWNER.text(row),
        root_cause: project::ROOT_CAUSE.text(row),
        action: project::ACTION.text(row),
        parameter: project::PARAMETER.text(row),
        target_date: project::TARGET_DATE.text(row),
    }
}

/// Percentage drop from `before` to `after`; `NoData` unless both are known
/// and the baseline is positive.
pub fn reduction(before: Option<f64>, after: Option<f64>) -> Metric {
    match (before, after) {
        (Some(before), Some(after)) => Metric::from_ratio(before - after, before),
        _ => Metric::NoData,
    }
}

pub fn six_sigma_project(idx: usize, row: &Row) -> SixSigmaProject {
    SixSigmaProject {
        name: project_name(idx, row),
        phase: project::PHASE.text(row),
        bucket: StatusBucket::classify(project::STATUS.text(row).as_deref()),
        owner: project::OWNER.text(row),
        defect_reduction: reduction(
            project::DEFECTS_BEFORE.stored_number(row),
            project::DEFECTS_AFTER.stored_number(row),
        ),
        cycle_time_reduction: reduction(
            project::CYCLE_TIME_BEFORE.stored_number(row),
            project::CYCLE_TIME_AFTER.stored_number(row),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), CellValue::from_text(value)))
            .collect()
    }

    #[test]
    fn kind_is_decided_by_substring() {
        assert_eq!(ProjectKind::classify(Some("RCA")), ProjectKind::Rca);
        assert_eq!(ProjectKind::classify(Some("Root cause (rca)")), ProjectKind::Rca);
        assert_eq!(ProjectKind::classify(Some("CAPA")), ProjectKind::Capa);
        assert_eq!(ProjectKind::classify(Some("Kaizen")), ProjectKind::Other);
        assert_eq!(ProjectKind::classify(None), ProjectKind::Other);
    }

    #[test]
    fn status_falls_back_to_pending() {
        assert_eq!(StatusBucket::classify(Some("Closed")), StatusBucket::Completed);
        assert_eq!(StatusBucket::classify(Some("In Progress")), StatusBucket::Open);
        assert_eq!(StatusBucket::classify(Some("Awaiting sign-off")), StatusBucket::Pending);
        assert_eq!(StatusBucket::classify(None), StatusBucket::Pending);
    }

    #[test]
    fn tracker_rows_are_counted_per_kind() {
        let mut dataset = Dataset::empty();
        dataset.rca_capa_rows = vec![
            row(&[("Project Name", "Offer delays"), ("Type", "RCA"), ("Status", "Done")]),
            row(&[("Type", "CAPA"), ("Current Status", "ongoing"), ("Owner", "Priya")]),
            row(&[("Type", "CAPA")]),
            row(&[("Project", "Checklist refresh"), ("Category", "rca"), ("STATUS", "open")]),
        ];

        let portfolio = build(&dataset);
        assert_eq!(portfolio.projects.len(), 4);
        assert_eq!(portfolio.projects[1].name, "Project 2");
        assert_eq!(portfolio.projects[1].owner.as_deref(), Some("Priya"));
        assert_eq!(portfolio.projects[3].name, "Checklist refresh");
        assert_eq!(
            portfolio.rca,
            BucketCounts {
                total: 2,
                completed: 1,
                open: 1,
                pending: 0
            }
        );
        assert_eq!(
            portfolio.capa,
            BucketCounts {
                total: 2,
                completed: 0,
                open: 1,
                pending: 1
            }
        );
        assert_eq!(portfolio.overall.total, 4);
        assert_eq!(portfolio.overall.completion_rate(), Metric::Value(25.0));
    }

    #[test]
    fn six_sigma_reductions_guard_zero_baselines() {
        let mut dataset = Dataset::empty();
        dataset.six_sigma_rows = vec![
            row(&[
                ("Project Name", "Offer TAT"),
                ("Defects Before", "40"),
                ("Defects After", "10"),
                ("Baseline TAT", "10"),
                ("Current TAT", "8"),
            ]),
            row(&[("Project Name", "Docs"), ("Defects Before", "0"), ("Defects After", "0")]),
        ];

        let portfolio = build(&dataset);
        assert_eq!(portfolio.six_sigma[0].defect_reduction, Metric::Value(75.0));
        assert_eq!(portfolio.six_sigma[0].cycle_time_reduction, Metric::Value(20.0));
        assert_eq!(portfolio.six_sigma[1].defect_reduction, Metric::NoData);
        assert_eq!(portfolio.six_sigma[1].cycle_time_reduction, Metric::NoData);
        assert_eq!(portfolio.mean_defect_reduction, Metric::Value(75.0));
        assert_eq!(portfolio.six_sigma_counts.pending, 2);
    }

    #[test]
    fn empty_dataset_has_no_projects() {
        let portfolio = build(&Dataset::empty());
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.overall.completion_rate(), Metric::NoData);
        assert_eq!(portfolio.mean_defect_reduction, Metric::NoData);
    }
}
