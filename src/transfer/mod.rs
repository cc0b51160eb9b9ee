pub mod compress;
pub mod manifest;
pub mod receiver;
pub mod resources;
pub mod sender;

pub use manifest::{FileEntry, Manifest};
pub use receiver::{ChunkIndex, FileReport, FileStatus, ReceiveReport, Receiver, SkippedBlob};
pub use resources::{DefaultPolicy, FixedPolicy, ResourcePolicy, Task};
pub use sender::{generate_key, ChunkSink, DirSink, MemorySink, SendReport, Sender};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::common::{GapError, GapResult};

/// Cooperative cancellation flag shared between a caller and a running transfer.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> GapResult<()> {
        if self.is_cancelled() {
            return Err(GapError::Cancelled);
        }
        Ok(())
    }
}
