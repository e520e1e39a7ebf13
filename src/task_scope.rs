use anyhow::Result;
use tokio::task::AbortHandle;

/// Background tasks owned by one map view. Cancelling the scope aborts all of
/// them, and nothing can be registered afterwards.
#[derive(Default)]
pub struct TaskScope {
    handles: Vec<AbortHandle>,
    cancelled: bool,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: AbortHandle) -> Result<()> {
        if self.cancelled {
            handle.abort();
            bail!("task scope is cancelled");
        }
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Returns the number of tasks that were still running.
    pub fn cancel_all(&mut self) -> usize {
        self.cancelled = true;
        let mut aborted = 0;
        for handle in self.handles.drain(..) {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        aborted
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
