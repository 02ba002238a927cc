//! Pipeline controller: scope filter, enable gate and event routing.

use std::{sync::Arc, time::Duration};

use crate::{
    audit::AuditLog,
    config::ChannelConfig,
    executor::Executor,
    grouper::BatchGrouper,
    messaging::{
        port::MirrorPort,
        types::{InboundEvent, NewMessage},
    },
    queue::{IngestQueue, MirrorSwitch},
    reconcile::Reconciler,
    store::IdStore,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MirrorStatus {
    pub enabled: bool,
    pub queued: usize,
    pub mapped: usize,
}

/// Owns the enabled switch and routes inbound events.
///
/// New messages are queued for the batch grouper; edits and deletes are
/// applied immediately.
pub struct Mirror {
    switch: MirrorSwitch,
    queue: Arc<IngestQueue>,
    executor: Arc<Executor>,
    reconciler: Reconciler,
}

impl Mirror {
    pub fn new(
        channel: ChannelConfig,
        port: Arc<dyn MirrorPort>,
        store: Arc<IdStore>,
        audit: AuditLog,
    ) -> Self {
        let executor = Arc::new(Executor::new(channel, port, store, audit));
        Self {
            switch: MirrorSwitch::new(),
            queue: Arc::new(IngestQueue::new()),
            reconciler: Reconciler::new(executor.clone()),
            executor,
        }
    }

    /// A grouper draining this mirror's queue.
    pub fn grouper(&self, interval: Duration) -> BatchGrouper {
        BatchGrouper::new(self.queue.clone(), self.executor.clone(), interval)
    }

    pub fn channel(&self) -> &ChannelConfig {
        self.executor.channel()
    }

    pub fn queue(&self) -> &Arc<IngestQueue> {
        &self.queue
    }

    /// Flip mirroring on/off and return the new state.
    pub fn toggle(&self) -> bool {
        let enabled = self.switch.toggle();
        tracing::info!(enabled, "mirroring toggled");
        enabled
    }

    /// Queue a new message unless mirroring is disabled.
    pub async fn admit(&self, msg: NewMessage) -> bool {
        if !self.switch.is_enabled() {
            tracing::debug!(origin_id = msg.id.0, "mirroring disabled, not queued");
            return false;
        }
        self.queue.push(msg).await;
        true
    }

    /// Outermost per-event boundary: nothing raised here stops the pipeline.
    pub async fn handle(&self, event: InboundEvent) {
        let chat_id = event.chat_id();
        if chat_id != self.channel().listen_group {
            tracing::debug!(chat_id = chat_id.0, "event outside source scope, ignored");
            return;
        }

        let label = event.label();
        let res = match event {
            InboundEvent::New(msg) => {
                self.admit(msg).await;
                Ok(())
            }
            InboundEvent::Edited(msg) => self.reconciler.on_edit(&msg).await.map(|_| ()),
            InboundEvent::Deleted(del) => {
                self.reconciler.on_delete(&del.ids).await;
                Ok(())
            }
        };

        if let Err(e) = res {
            tracing::error!(event = label, chat_id = chat_id.0, "failed to handle event: {e}");
        }
    }

    pub async fn status(&self) -> Result<MirrorStatus> {
        Ok(MirrorStatus {
            enabled: self.switch.is_enabled(),
            queued: self.queue.len().await,
            mapped: self.executor.store().len().await?,
        })
    }
}
