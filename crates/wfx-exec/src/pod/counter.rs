use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU64, Ordering},
};

/// Source of unique generated volume names (`vol-<n>`).
///
/// Clones share the same sequence. Tests create independent counters with
/// [`VolumeNameCounter::new`]; builders in one process normally use [`VolumeNameCounter::shared`].
#[derive(Debug, Clone, Default)]
pub struct VolumeNameCounter {
    next: Arc<AtomicU64>,
}

impl VolumeNameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide counter.
    pub fn shared() -> Self {
        static SHARED: OnceLock<VolumeNameCounter> = OnceLock::new();
        SHARED.get_or_init(VolumeNameCounter::new).clone()
    }

    pub fn next_name(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("vol-{n}")
    }
}
