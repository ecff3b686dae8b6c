use std::fmt::Write;

use crate::models::format_number;
use crate::state::{DashboardViews, ViewSlot};
use crate::views::insights::Severity;
use crate::views::kpi::KpiSummary;
use crate::views::trends::describe_point;

/// The four headline cards as display lines.
pub fn kpi_lines(kpis: &KpiSummary) -> Vec<String> {
    vec![
        format!("Total audits: {}", format_number(kpis.total_audits)),
        format!("Accuracy: {}", kpis.accuracy),
        format!("Error rate: {}", kpis.error_rate),
        format!("Sample coverage: {}", kpis.sample_coverage),
        format!("Completeness: {}", kpis.completeness),
    ]
}

fn ready<'a, T>(output: &mut String, slot: &'a ViewSlot<T>) -> Option<&'a T> {
    match slot {
        ViewSlot::Ready { data } => Some(data),
        ViewSlot::Unavailable { reason, .. } => {
            let _ = writeln!(output, "_This view could not be built: {reason}._");
            None
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "CRITICAL",
        Severity::Warning => "WARNING",
        Severity::Info => "INFO",
        Severity::Positive => "GOOD",
    }
}

pub fn build_report(views: &DashboardViews, limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Recruitment Audit Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} records in view, upload {})",
        views.filter_summary, views.records_in_view, views.upload_id
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Headline KPIs");
    if let Some(kpis) = ready(&mut output, &views.kpis) {
        for line in kpi_lines(kpis) {
            let _ = writeln!(output, "- {line}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    if let Some(narrative) = ready(&mut output, &views.narrative) {
        let _ = writeln!(output, "{}", narrative.sentences.join(" "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Stages");
    if let Some(breakdown) = ready(&mut output, &views.stages) {
        if breakdown.stages.is_empty() {
            let _ = writeln!(output, "No stages recorded for these filters.");
        }
        for stage in &breakdown.stages {
            let _ = writeln!(
                output,
                "- {}: accuracy {}, {} failures across {} opportunities",
                stage.stage,
                stage.accuracy,
                format_number(stage.failures),
                format_number(stage.opportunities)
            );
        }

        if let Some(selected) = &breakdown.selected_stage {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Parameters for {selected}");
            if breakdown.top_by_errors.is_empty() {
                let _ = writeln!(output, "No failures recorded for this stage.");
            }
            for stat in breakdown.top_by_errors.iter().take(limit) {
                let _ = writeln!(
                    output,
                    "- {}: {} failures ({:.1}% error rate)",
                    stat.parameter,
                    format_number(stat.failures),
                    stat.error_rate
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recruiters");
    if let Some(board) = ready(&mut output, &views.recruiters) {
        match &board.recruiter_of_period {
            Some(best) => {
                let _ = writeln!(
                    output,
                    "Recruiter of the period: {} ({:.1}% over {} samples)",
                    best.name,
                    best.accuracy,
                    format_number(best.samples)
                );
            }
            None => {
                let _ = writeln!(output, "No recruiter has enough samples for recognition.");
            }
        }
        for stat in board.leaderboard.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {}: {:.1}% accuracy, {} samples, {:.1}% of errors",
                stat.name,
                stat.accuracy,
                format_number(stat.samples),
                stat.error_share
            );
        }
        if board.high_variance {
            let _ = writeln!(
                output,
                "Accuracy varies widely (standard deviation {:.1} points).",
                board.accuracy_std_dev
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");
    if let Some(trends) = ready(&mut output, &views.trends) {
        if trends.monthly.is_empty() {
            let _ = writeln!(output, "No monthly data for these filters.");
        }
        for point in &trends.monthly {
            let _ = writeln!(output, "- {}", describe_point(point));
        }
        if !trends.forecast.is_empty() {
            let projected: Vec<String> = trends
                .forecast
                .iter()
                .map(|point| format!("{} {:.1}%", point.period, point.accuracy))
                .collect();
            let _ = writeln!(output, "Projected accuracy: {}", projected.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    if let Some(insights) = ready(&mut output, &views.insights) {
        if insights.is_empty() {
            let _ = writeln!(output, "No findings for these filters.");
        }
        for insight in insights {
            let _ = writeln!(
                output,
                "- [{}] {}: {} {}",
                severity_label(insight.severity),
                insight.title,
                insight.detail,
                insight.recommendation
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strategic Projects");
    if let Some(portfolio) = ready(&mut output, &views.projects) {
        if portfolio.is_empty() {
            let _ = writeln!(output, "No RCA/CAPA or Six Sigma projects in this upload.");
        } else {
            for (label, counts) in [("RCA", &portfolio.rca), ("CAPA", &portfolio.capa)] {
                let _ = writeln!(
                    output,
                    "- {label}: {} total, {} completed, {} open, {} pending",
                    counts.total, counts.completed, counts.open, counts.pending
                );
            }
            if !portfolio.six_sigma.is_empty() {
                let _ = writeln!(
                    output,
                    "- Six Sigma: {} projects, mean defect reduction {}",
                    portfolio.six_sigma.len(),
                    portfolio.mean_defect_reduction
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Exceptions");
    if let Some(summary) = ready(&mut output, &views.exceptions) {
        if summary.total == 0 {
            let _ = writeln!(output, "No exceptions logged.");
        }
        for entry in summary.by_category.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {}: {} ({:.1}%)",
                entry.label, entry.count, entry.share
            );
        }
    }

    if !views.warnings.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Data Warnings");
        for warning in &views.warnings {
            let _ = writeln!(output, "- {}", warning.message);
        }
    }

    output
}
