pub mod buffer;
pub mod cleanup;
pub mod handle;
pub mod registry;
pub mod runner;

pub use buffer::LogBuffer;
pub use cleanup::{CleanOptions, CleanReport, CleanStrategy, clean, list_runs};
pub use handle::ProcessHandle;
pub use registry::RunnerRegistry;
pub use runner::{DrainOutput, Runner, RunnerState};
