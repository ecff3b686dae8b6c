//! Builders that reduce a filtered view into the data behind each dashboard
//! panel. None of them hold state or render anything; they return plain,
//! serializable structures.

pub mod exceptions;
pub mod insights;
pub mod kpi;
pub mod narrative;
pub mod projects;
pub mod recruiters;
pub mod stages;
pub mod trends;

pub use kpi::{KpiSummary, Metric};
