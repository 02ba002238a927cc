use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::Mutex;

use crate::messaging::types::NewMessage;

/// Unbounded FIFO of new messages waiting for the next drain cycle.
///
/// Guarded by its own lock, distinct from the identity store's gate.
#[derive(Default)]
pub struct IngestQueue {
    inner: Mutex<VecDeque<NewMessage>>,
}

impl IngestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, msg: NewMessage) {
        self.inner.lock().await.push_back(msg);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Take everything queued so far, in arrival order.
    ///
    /// The lock is released on return; messages pushed afterwards wait for the
    /// next drain.
    pub async fn take_all(&self) -> VecDeque<NewMessage> {
        std::mem::take(&mut *self.inner.lock().await)
    }
}

/// Process-wide "mirroring enabled" flag. Cloning shares the flag.
#[derive(Clone, Debug)]
pub struct MirrorSwitch {
    enabled: Arc<AtomicBool>,
}

impl Default for MirrorSwitch {
    fn default() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MirrorSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::SeqCst)
    }
}
