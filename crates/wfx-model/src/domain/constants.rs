//! Well-known label keys attached to payloads built for container backends.

/// Label key carrying the application name of a submitted pod.
pub const LABEL_APP: &str = "app";

/// Label key carrying the task identifier of a submitted pod.
///
/// Lets an operator map a pod back to the workflow task that created it.
pub const LABEL_TASK_ID: &str = "wfx/task-id";
