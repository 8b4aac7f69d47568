//! Terminal output: progress spinners and result tables

pub mod display;
pub mod progress;

pub use display::{show_final_output, show_health, show_report};
pub use progress::{create_step_spinner, spawn_event_spinner};
