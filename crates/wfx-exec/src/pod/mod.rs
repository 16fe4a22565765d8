//! Pod backend: resource declaration to pod payload, and a handler driving a [`PodApi`].
mod api;
pub use api::{DryRunPodApi, PodApi, PodPhase};

mod builder;
pub use builder::PodSpecBuilder;

mod counter;
pub use counter::VolumeNameCounter;

mod handler;
pub use handler::PodHandler;

pub mod payload;
pub use payload::PodPayload;
