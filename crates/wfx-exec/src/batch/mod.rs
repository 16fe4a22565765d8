//! Batch backend: each task is one job of an HPC batch system.
mod client;
pub use client::{BatchClient, BatchState, JobId};

mod job;
pub use job::BatchJob;

mod slurm;
pub use slurm::{SlurmClient, parse_sbatch, parse_state};

mod handler;
pub use handler::BatchHandler;
