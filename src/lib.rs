//! Recruitment audit analytics: sheet resolution, normalization, filtering
//! and the derived dashboard views.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod fields;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod report;
pub mod sheets;
pub mod source;
pub mod state;
pub mod views;

pub use error::DashboardError;
pub use state::{AppState, DashboardViews};
