//! Client-side logic for the gallery optimization app.
//!
//! Everything here is target independent: the browser glue in `galeria_web`
//! and the terminal client in `galeria_cli` both drive the same chart specs,
//! form rules, submit decisions and poll state machine.

pub mod chart;
pub mod coerce;
pub mod config;
pub mod form;
pub mod progress;
pub mod routes;
pub mod submit;

use thiserror::Error;

pub use chart::{comparison_charts, normalize_series, ChartBundle, ChartKind, ChartSpec, Dataset};
pub use config::ClientConfig;
pub use form::{ParamForm, SlotFields, ValidationError, WeightFields, SLOT_COUNT};
pub use progress::{scan_logs, ItemBar, LogScan, NextStep, PollState, StatusSnapshot, TickReport};
pub use submit::{StartedJob, SubmitOutcome, SubmitResponse};

/// Status string the server reports once a run is done.
pub const STATUS_COMPLETED: &str = "completado";
/// Status assumed when the server omits one.
pub const STATUS_RUNNING: &str = "ejecutando";

#[derive(Error, Debug)]
pub enum GaleriaError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("chart data has no labels")]
    EmptyLabels,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("status polling gave up after {0} consecutive failures")]
    PollGaveUp(u32),
}
