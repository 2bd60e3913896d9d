//! CLI command implementations.

mod config;
mod doctor;
mod process;

pub use config::run_config;
pub use doctor::run_doctor;
pub use process::run_process;
