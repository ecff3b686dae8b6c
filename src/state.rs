//! Dashboard state: the published dataset, the active filters and the
//! recomputation of every view.
//!
//! A new upload goes through `validate` and `process` before `publish` swaps
//! it in, so a view never observes a half-built dataset. Any change to the
//! filters invalidates everything; `refresh` rebuilds all views from scratch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::filter::{self, Dimension, FilterOptions, FilterState, Selector};
use crate::models::{Dataset, RawSheetSet, SheetWarning};
use crate::normalize::normalize;
use crate::sheets::{self, ResolvedSheets};
use crate::views::exceptions::{self, ExceptionSummary};
use crate::views::insights::{self, Insight, InsightInputs};
use crate::views::kpi::{self, KpiSummary};
use crate::views::narrative::{self, Narrative};
use crate::views::projects::{self, ProjectPortfolio};
use crate::views::recruiters::{self, RecruiterBoard};
use crate::views::stages::{self, Heatmap, StageBreakdown};
use crate::views::trends::{self, ForecastStrategy, StepProjection, Trends};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStep {
    Validating,
    Processing,
    Publishing,
    Complete,
}

impl IngestStep {
    pub fn percent(self) -> u8 {
        match self {
            IngestStep::Validating => 20,
            IngestStep::Processing => 50,
            IngestStep::Publishing => 80,
            IngestStep::Complete => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestProgress {
    pub step: IngestStep,
    pub percent: u8,
}

impl From<IngestStep> for IngestProgress {
    fn from(step: IngestStep) -> Self {
        Self {
            step,
            percent: step.percent(),
        }
    }
}

/// A view's output, or the reason it could not be built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ViewSlot<T> {
    Ready { data: T },
    Unavailable { view: String, reason: String },
}

impl<T> ViewSlot<T> {
    pub fn unavailable(view: &str, reason: impl Into<String>) -> Self {
        ViewSlot::Unavailable {
            view: view.to_string(),
            reason: reason.into(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewSlot::Ready { data } => Some(data),
            ViewSlot::Unavailable { .. } => None,
        }
    }
}

/// Runs one view builder, turning a panic into an unavailable slot so the
/// remaining views still render.
pub fn contain<T>(view: &str, build: impl FnOnce() -> T) -> ViewSlot<T> {
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(data) => {
            debug!(view, elapsed_us = started.elapsed().as_micros() as u64, "view built");
            ViewSlot::Ready { data }
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(view, reason = %reason, "view builder failed");
            ViewSlot::unavailable(view, reason)
        }
    }
}

/// Text of a panic payload, for logging.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-text panic payload".to_string()
    }
}

/// Replaces the default panic hook, which writes straight to stderr, with a
/// `tracing` event carrying the message and source location.
pub fn route_panics_to_tracing() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_default();
        error!(location = %location, reason = %panic_message(info.payload()), "panic");
    }));
}

/// Single in-memory slot for a serialized dataset snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSlot {
    blob: Option<Value>,
}

impl SnapshotSlot {
    pub fn store(&mut self, blob: Value) {
        self.blob = Some(blob);
    }

    pub fn fetch(&self) -> Result<&Value, DashboardError> {
        self.blob.as_ref().ok_or(DashboardError::SnapshotEmpty)
    }

    pub fn clear(&mut self) {
        self.blob = None;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardViews {
    pub upload_id: Uuid,
    pub filters: FilterState,
    pub filter_summary: String,
    pub selected_stage: Option<String>,
    pub options: FilterOptions,
    pub records_in_view: usize,
    pub kpis: ViewSlot<KpiSummary>,
    pub narrative: ViewSlot<Narrative>,
    pub stages: ViewSlot<StageBreakdown>,
    pub heatmap: ViewSlot<Heatmap>,
    pub recruiters: ViewSlot<RecruiterBoard>,
    pub trends: ViewSlot<Trends>,
    pub insights: ViewSlot<Vec<Insight>>,
    pub projects: ViewSlot<ProjectPortfolio>,
    pub exceptions: ViewSlot<ExceptionSummary>,
    pub warnings: Vec<SheetWarning>,
}

pub struct AppState {
    dataset: Option<Arc<Dataset>>,
    filters: FilterState,
    selected_stage: Option<String>,
    config: DashboardConfig,
    forecast: Box<dyn ForecastStrategy>,
    snapshot: SnapshotSlot,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        let forecast = Box::new(StepProjection::from_policy(&config.trends));
        Self {
            dataset: None,
            filters: FilterState::default(),
            selected_stage: None,
            config,
            forecast,
            snapshot: SnapshotSlot::default(),
        }
    }

    pub fn with_forecast(mut self, forecast: Box<dyn ForecastStrategy>) -> Self {
        self.forecast = forecast;
        self
    }

    /// First upload step: locate the required and optional sheets.
    pub fn validate(sheets: &RawSheetSet) -> Result<ResolvedSheets, DashboardError> {
        sheets::resolve(sheets)
    }

    /// Second upload step: build the canonical dataset.
    pub fn process(resolved: ResolvedSheets) -> Dataset {
        normalize(resolved)
    }

    /// Swaps in a fully built dataset and clears the selections made against
    /// the previous one.
    pub fn publish(&mut self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        info!(
            upload_id = %dataset.upload_id,
            records = dataset.records.len(),
            warnings = dataset.warnings.len(),
            "dataset published"
        );
        self.dataset = Some(Arc::clone(&dataset));
        self.filters = FilterState::default();
        self.selected_stage = None;
        dataset
    }

    /// Runs every upload step, reporting progress after each one. On failure
    /// the previously published dataset stays in place.
    pub fn ingest(
        &mut self,
        sheets: &RawSheetSet,
        mut on_progress: impl FnMut(IngestProgress),
    ) -> Result<Arc<Dataset>, DashboardError> {
        on_progress(IngestStep::Validating.into());
        let resolved = Self::validate(sheets)?;

        on_progress(IngestStep::Processing.into());
        let dataset = Self::process(resolved);

        on_progress(IngestStep::Publishing.into());
        let dataset = self.publish(dataset);

        on_progress(IngestStep::Complete.into());
        Ok(dataset)
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn set_filter(&mut self, dimension: Dimension, selector: Selector) {
        self.filters = self.filters.with(dimension, selector);
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
    }

    pub fn reset_filters(&mut self) {
        self.filters = FilterState::default();
    }

    pub fn select_stage(&mut self, stage: Option<String>) {
        self.selected_stage = stage.filter(|stage| !stage.trim().is_empty());
    }

    /// Rebuilds every view for the current filters.
    pub fn refresh(&self) -> Result<DashboardViews, DashboardError> {
        let dataset = self.dataset.as_deref().ok_or(DashboardError::NoDataset)?;
        let config = &self.config;
        let view = filter::apply(&self.filters, dataset);
        debug!(
            filters = %self.filters.describe(),
            records = view.len(),
            "applied filters"
        );

        let kpis = contain("kpis", || kpi::build(&view));
        let narrative = match kpis.ready() {
            Some(summary) => contain("narrative", || {
                narrative::build(&view, summary, &config.narrative)
            }),
            None => ViewSlot::unavailable("narrative", "kpis unavailable"),
        };
        let stages = contain("stages", || {
            stages::build(&view, self.selected_stage.as_deref(), &config.stages)
        });
        let heatmap = contain("heatmap", || stages::heatmap(&view));
        let recruiters = contain("recruiters", || {
            recruiters::build(dataset, &view, &self.filters, &config.recruiters)
        });
        let trends = contain("trends", || {
            trends::build(
                dataset,
                &view,
                &self.filters,
                &config.trends,
                self.forecast.as_ref(),
            )
        });
        let insights = match (kpis.ready(), recruiters.ready()) {
            (Some(summary), Some(board)) => contain("insights", || {
                insights::build(&InsightInputs {
                    view: &view,
                    kpis: summary,
                    recruiters: board,
                    bands: &config.narrative,
                    thresholds: &config.insights,
                })
            }),
            _ => ViewSlot::unavailable("insights", "kpis or recruiters unavailable"),
        };
        let projects = contain("projects", || projects::build(dataset));
        let exceptions = contain("exceptions", || exceptions::build(dataset));

        Ok(DashboardViews {
            upload_id: dataset.upload_id,
            filter_summary: self.filters.describe(),
            filters: self.filters.clone(),
            selected_stage: self.selected_stage.clone(),
            options: FilterOptions::from_dataset(dataset, config.trends.fiscal_start()),
            records_in_view: view.len(),
            kpis,
            narrative,
            stages,
            heatmap,
            recruiters,
            trends,
            insights,
            projects,
            exceptions,
            warnings: dataset.warnings.clone(),
        })
    }

    /// Stores the published dataset in the snapshot slot.
    pub fn save_snapshot(&mut self) -> Result<(), DashboardError> {
        let dataset = self.dataset.as_deref().ok_or(DashboardError::NoDataset)?;
        let blob = serde_json::to_value(dataset)?;
        self.snapshot.store(blob);
        Ok(())
    }

    /// Publishes the dataset held in the snapshot slot.
    pub fn restore_snapshot(&mut self) -> Result<Arc<Dataset>, DashboardError> {
        let blob = self.snapshot.fetch()?.clone();
        let dataset: Dataset = serde_json::from_value(blob)?;
        Ok(self.publish(dataset))
    }

    pub fn snapshot(&self) -> &SnapshotSlot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut SnapshotSlot {
        &mut self.snapshot
    }
}
