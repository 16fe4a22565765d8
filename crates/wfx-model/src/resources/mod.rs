mod mount;
pub use mount::{Mount, MountSource};

mod task;
pub use task::TaskResources;
