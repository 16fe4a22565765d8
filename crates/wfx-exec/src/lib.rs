//! Concrete [`wfx_core::TaskHandler`] backends.
//!
//! - `local`: OS processes via `tokio::process`.
//! - `batch`: HPC batch systems (Slurm) through a [`batch::BatchClient`].
//! - `pod`: container orchestrator pods built with [`pod::PodSpecBuilder`].
mod error;
pub use error::{ExecError, SpecError};

mod output;
pub use output::LogConfig;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "batch")]
pub mod batch;

#[cfg(feature = "pod")]
pub mod pod;

/// Backend name of local processes.
pub const BACKEND_LOCAL: &str = "local";
/// Backend name of batch jobs.
pub const BACKEND_BATCH: &str = "slurm";
/// Backend name of pods.
pub const BACKEND_POD: &str = "k8s";
