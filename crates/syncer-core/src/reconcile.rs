//! Edit and delete propagation against the identity store.
//!
//! Both run synchronously on arrival. An edit or delete that races ahead of
//! its still-pending forward finds no mapping and is dropped with a log line.

use std::sync::Arc;

use crate::{
    audit::AuditEvent,
    domain::MessageId,
    executor::Executor,
    messaging::types::{Content, EditedMessage},
    Result,
};

pub const DELETE_UNRESOLVED_WARNING: &str = "[WARNING] delete message failed.";
pub const RPC_ERROR_NOTICE: &str = "Got rpc error, see console to get more information";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Edited(MessageId),
    /// No mapping for the origin id; nothing to edit.
    Unmapped,
    /// Content kind has nothing editable (stickers, unknown payloads).
    Skipped,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(Vec<MessageId>),
    NothingResolved,
    Failed,
}

pub struct Reconciler {
    executor: Arc<Executor>,
}

impl Reconciler {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    pub async fn on_edit(&self, msg: &EditedMessage) -> Result<EditOutcome> {
        let target = match self.executor.store().lookup(msg.id).await {
            Ok(target) => target,
            Err(e) if e.is_not_found() => {
                tracing::info!(origin_id = msg.id.0, "edit dropped: {e}");
                return Ok(EditOutcome::Unmapped);
            }
            Err(e) => return Err(e),
        };

        let port = self.executor.port();
        let to = self.executor.channel().fwd_to;
        let res = match &msg.content {
            Content::Text { text, .. } => port.edit_text(to, target, text).await,
            Content::Media { caption, .. } => {
                port.edit_caption(to, target, caption.as_deref().unwrap_or(""))
                    .await
            }
            Content::Sticker { .. } | Content::Unrecognized => {
                tracing::debug!(origin_id = msg.id.0, "edit has nothing to apply");
                return Ok(EditOutcome::Skipped);
            }
        };

        match res {
            Ok(()) => {
                self.executor.audit().record(AuditEvent::edit(
                    msg.id,
                    target,
                    msg.content.kind_label(),
                ));
                Ok(EditOutcome::Edited(target))
            }
            Err(e) => {
                self.executor.fail("edit", &e).await;
                Ok(EditOutcome::Failed)
            }
        }
    }

    /// Resolve each id on its own and delete whatever resolved in one call.
    /// Mapping rows are kept.
    pub async fn on_delete(&self, origin_ids: &[MessageId]) -> DeleteOutcome {
        let mut origins = Vec::with_capacity(origin_ids.len());
        let mut targets = Vec::with_capacity(origin_ids.len());
        for &origin_id in origin_ids {
            match self.executor.store().lookup(origin_id).await {
                Ok(target) => {
                    origins.push(origin_id);
                    targets.push(target);
                }
                Err(e) => tracing::warn!(origin_id = origin_id.0, "delete skipped: {e}"),
            }
        }

        if targets.is_empty() {
            self.executor.notify(DELETE_UNRESOLVED_WARNING).await;
            return DeleteOutcome::NothingResolved;
        }

        let to = self.executor.channel().fwd_to;
        match self.executor.port().delete_messages(to, &targets).await {
            Ok(()) => {
                self.executor
                    .audit()
                    .record(AuditEvent::delete(&origins, &targets));
                DeleteOutcome::Deleted(targets)
            }
            Err(e) => {
                tracing::error!(count = targets.len(), "delete failed: {e}");
                self.executor.notify(RPC_ERROR_NOTICE).await;
                DeleteOutcome::Failed
            }
        }
    }
}
