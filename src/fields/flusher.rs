use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use crate::core::error::Result;
use crate::fields::directory::SparseDirectory;

/// Background thread that persists a directory every `interval` while it
/// has unflushed changes
pub struct FlushTask {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushTask {
    pub fn spawn(directory: Arc<SparseDirectory>, interval: Duration) -> Result<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("docid-fields-flush".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Err(e) = directory.flush() {
                                tracing::error!(error = %e, "periodic flush of docid fields index failed");
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("docid fields flush task stopped");
            })?;

        Ok(FlushTask { stop, handle })
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            tracing::error!("docid fields flush task panicked");
        }
    }
}
