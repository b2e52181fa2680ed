//! TUI module: Terminal User Interface using Ratatui.
//!
//! - Patient data entry (baseline values and monitoring rounds)
//! - Prediction results with E2 reference percentile charts

mod app;
mod styles;
mod ui;

pub use app::{App, Screen};
pub use styles::MedicalTheme;
