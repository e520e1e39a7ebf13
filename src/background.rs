use anyhow::Result;
use tokio::runtime::{Builder, Handle, Runtime};

/// Pool for I/O bound work that must stay off the interactive thread.
pub struct BackgroundPool {
    runtime: Option<Runtime>,
}

impl BackgroundPool {
    pub fn new(worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name("background-io");
        if let Some(n) = worker_threads {
            builder.worker_threads(n.max(1));
        }
        let runtime = builder.build()?;
        debug!("[background] pool started");
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    pub fn handle(&self) -> Handle {
        match &self.runtime {
            Some(runtime) => runtime.handle().clone(),
            // `runtime` is only taken in `drop`
            None => unreachable!(),
        }
    }
}

impl Drop for BackgroundPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            // returns without waiting for running tasks
            runtime.shutdown_background();
            debug!("[background] pool stopped");
        }
    }
}
