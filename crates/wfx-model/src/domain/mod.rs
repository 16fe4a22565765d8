mod env;
pub use env::{Env, EnvVar};

mod labels;
pub use labels::Labels;

mod id;
pub use id::TaskId;

mod constants;
pub use constants::{LABEL_APP, LABEL_TASK_ID};

/// Interval value in milliseconds.
///
/// Used by configuration types where a duration is provided by the user.
pub type IntervalMs = u64;
