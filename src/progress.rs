/// Receives `(current, total, message)` at each request boundary.
/// Implementations must tolerate being ignored entirely.
pub trait Progress: Send + Sync {
    fn update(&self, current: usize, total: usize, message: &str);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&self, _current: usize, _total: usize, _message: &str) {}
}

/// Reports progress through `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn update(&self, current: usize, total: usize, message: &str) {
        tracing::info!(current, total, "{}", message);
    }
}
