use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use recruitment_audit_insights::config::DashboardConfig;
use recruitment_audit_insights::filter::{FilterState, Selector};
use recruitment_audit_insights::models::format_number;
use recruitment_audit_insights::report;
use recruitment_audit_insights::sheets;
use recruitment_audit_insights::source::load_workbook;
use recruitment_audit_insights::state::{route_panics_to_tracing, AppState, DashboardViews};

#[derive(Parser)]
#[command(name = "audit-insights")]
#[command(about = "Recruitment audit dashboard over an exported workbook", long_about = None)]
struct Cli {
    /// JSON file overriding dashboard thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which sheet was matched to each role
    Sheets {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print KPIs, narrative and top findings
    Summary {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write every view as JSON
    Export {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "dashboard.json")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Workbook file or a directory of per-sheet CSV files
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "all")]
    year: Selector,
    #[arg(long, default_value = "all")]
    month: Selector,
    #[arg(long, default_value = "all")]
    week: Selector,
    #[arg(long, default_value = "all")]
    stage: Selector,
    #[arg(long, default_value = "all")]
    parameter: Selector,
    /// Stage tab for the parameter breakdown
    #[arg(long)]
    focus_stage: Option<String>,
}

impl ViewArgs {
    fn filters(&self) -> FilterState {
        FilterState {
            year: self.year.clone(),
            month: self.month.clone(),
            week: self.week.clone(),
            stage: self.stage.clone(),
            parameter: self.parameter.clone(),
        }
    }
}

fn main() {
    init_tracing();
    route_panics_to_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = DashboardConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Sheets { input } => {
            let workbook = load_workbook(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let resolved = sheets::resolve(&workbook).context("workbook is not an audit export")?;

            println!("Sheets matched in {}:", input.display());
            for (role, name) in resolved.matches() {
                println!("- {role}: {name}");
            }
            for warning in &resolved.warnings {
                println!("! {}", warning.message);
            }
        }
        Commands::Summary { view, limit } => {
            let views = compute_views(config, &view)?;
            print_summary(&views, limit);
        }
        Commands::Report { view, limit, out } => {
            let views = compute_views(config, &view)?;
            let report = report::build_report(&views, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { view, out } => {
            let views = compute_views(config, &view)?;
            let json = serde_json::to_string_pretty(&views).context("failed to encode views")?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Dashboard data written to {}.", out.display());
        }
    }

    Ok(())
}

fn compute_views(config: DashboardConfig, args: &ViewArgs) -> Result<DashboardViews> {
    let workbook = load_workbook(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let mut state = AppState::new(config);
    state
        .ingest(&workbook, |progress| {
            tracing::debug!(step = ?progress.step, percent = progress.percent, "ingest progress");
        })
        .context("failed to ingest workbook")?;
    state.set_filters(args.filters());
    state.select_stage(args.focus_stage.clone());

    let views = state.refresh().context("failed to build dashboard views")?;
    Ok(views)
}

fn print_summary(views: &DashboardViews, limit: usize) {
    println!(
        "Audit summary for {} ({} records):",
        views.filter_summary, views.records_in_view
    );

    if let Some(kpis) = views.kpis.ready() {
        for line in report::kpi_lines(kpis) {
            println!("- {line}");
        }
    }
    if let Some(narrative) = views.narrative.ready() {
        println!();
        for sentence in &narrative.sentences {
            println!("{sentence}");
        }
    }

    if let Some(board) = views.recruiters.ready() {
        if !board.leaderboard.is_empty() {
            println!();
            println!("Top recruiters:");
            for stat in board.leaderboard.iter().take(limit) {
                println!(
                    "- {} {:.1}% across {} samples",
                    stat.name,
                    stat.accuracy,
                    format_number(stat.samples)
                );
            }
        }
    }

    if let Some(insights) = views.insights.ready() {
        if !insights.is_empty() {
            println!();
            println!("Findings:");
            for insight in insights.iter().take(limit) {
                println!("- {}: {}", insight.title, insight.recommendation);
            }
        }
    }

    for warning in &views.warnings {
        println!("! {}", warning.message);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
