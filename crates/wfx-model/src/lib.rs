mod domain;
pub use domain::{Env, EnvVar, IntervalMs, LABEL_APP, LABEL_TASK_ID, Labels, TaskId};

mod error;
pub use error::{ModelError, ModelResult};

mod status;
pub use status::TaskStatus;

mod resources;
pub use resources::{Mount, MountSource, TaskResources};

mod config;
pub use config::{ExecutorSettings, SessionConfig};
