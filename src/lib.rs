// src/lib.rs
pub mod cli;
pub mod config;
pub mod runner;
pub mod utils;

pub use config::defs::{RunnerError, StopPolicy};
pub use runner::{
    CleanOptions, CleanReport, CleanStrategy, DrainOutput, LogBuffer, Runner, RunnerRegistry,
    RunnerState,
};
pub use utils::command::CommandLine;
