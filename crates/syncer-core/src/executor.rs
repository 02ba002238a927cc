//! Outbound side of the pipeline: forward runs, comments and dividers.

use std::sync::Arc;

use crate::{
    audit::{AuditEvent, AuditLog},
    config::ChannelConfig,
    domain::{ChatId, IdMapping, MessageId},
    messaging::{
        port::MirrorPort,
        types::{Content, NewMessage},
    },
    store::IdStore,
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentOutcome {
    Sent(Option<MessageId>),
    /// Nothing to mirror (unrecognized content).
    Dropped,
}

pub struct Executor {
    channel: ChannelConfig,
    port: Arc<dyn MirrorPort>,
    store: Arc<IdStore>,
    audit: AuditLog,
}

impl Executor {
    pub fn new(
        channel: ChannelConfig,
        port: Arc<dyn MirrorPort>,
        store: Arc<IdStore>,
        audit: AuditLog,
    ) -> Self {
        Self {
            channel,
            port,
            store,
            audit,
        }
    }

    pub fn channel(&self) -> &ChannelConfig {
        &self.channel
    }

    pub fn port(&self) -> &Arc<dyn MirrorPort> {
        &self.port
    }

    pub fn store(&self) -> &Arc<IdStore> {
        &self.store
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Forward one run in a single call and pair the results positionally.
    ///
    /// The client returns ids in request order; a short result under-maps the
    /// tail of the run.
    pub async fn forward_run(
        &self,
        from: ChatId,
        origins: &[MessageId],
    ) -> Result<Vec<IdMapping>> {
        let targets = self
            .port
            .forward_messages(self.channel.fwd_to, from, origins)
            .await?;

        if targets.len() != origins.len() {
            tracing::warn!(
                requested = origins.len(),
                returned = targets.len(),
                "forward result length mismatch, pairing positionally"
            );
        }

        let pairs: Vec<IdMapping> = origins
            .iter()
            .zip(targets.iter())
            .map(|(&origin_id, &target_id)| IdMapping {
                origin_id,
                target_id,
            })
            .collect();

        tracing::debug!(count = pairs.len(), "forwarded run");
        self.audit.record(AuditEvent::forward(origins, &targets));
        Ok(pairs)
    }

    /// Relay a divider sticker standalone. The caller persists the pair.
    pub async fn send_divider(&self, msg: &NewMessage) -> Result<Option<MessageId>> {
        let Some(file_id) = msg.content.sticker_file_id() else {
            return Err(Error::External(format!(
                "message {} is not a sticker",
                msg.id.0
            )));
        };

        let target = self
            .port
            .send_sticker(self.channel.fwd_to, file_id, None)
            .await?;
        self.audit.record(AuditEvent::divider(msg.id, target));
        Ok(target)
    }

    /// Send a comment (threaded when its reply target is mapped) and persist
    /// the pair immediately.
    pub async fn send_comment(&self, msg: &NewMessage) -> Result<CommentOutcome> {
        if msg.content == Content::Unrecognized {
            tracing::debug!(origin_id = msg.id.0, "nothing to mirror, dropping");
            return Ok(CommentOutcome::Dropped);
        }

        let reply_to = self.resolve_reply(msg.reply_to_id).await;
        let to = self.channel.fwd_to;

        let target = match &msg.content {
            Content::Text { text, link_preview } => {
                self.port
                    .send_text(to, text, reply_to, *link_preview)
                    .await?
            }
            Content::Media { media, caption } => {
                self.port
                    .send_media(to, media, caption.as_deref(), reply_to)
                    .await?
            }
            Content::Sticker { file_id } => self.port.send_sticker(to, file_id, reply_to).await?,
            Content::Unrecognized => return Ok(CommentOutcome::Dropped),
        };

        self.audit
            .record(AuditEvent::send(msg.id, target, msg.content.kind_label()));
        self.store.insert_one(msg.id, target).await?;
        Ok(CommentOutcome::Sent(target))
    }

    async fn resolve_reply(&self, reply_to: Option<MessageId>) -> Option<MessageId> {
        let origin_id = reply_to?;
        match self.store.lookup(origin_id).await {
            Ok(target) => Some(target),
            Err(e) if e.is_not_found() => {
                tracing::debug!(origin_id = origin_id.0, "reply target unknown, sending unthreaded");
                None
            }
            Err(e) => {
                tracing::warn!(origin_id = origin_id.0, "reply lookup failed, sending unthreaded: {e}");
                None
            }
        }
    }

    /// Log a failure and, for client errors, tell the operator.
    pub async fn fail(&self, context: &str, err: &Error) {
        tracing::error!(context, "{err}");
        self.audit.record(AuditEvent::error(context, &err.to_string()));

        if matches!(err, Error::External(_)) {
            self.notify(&format!(
                "[WARNING] {context} failed, see console to get more information."
            ))
            .await;
        }
    }

    /// Best-effort notice into the source scope.
    pub async fn notify(&self, text: &str) {
        if let Err(e) = self
            .port
            .send_notification(self.channel.listen_group, text)
            .await
        {
            tracing::warn!("operator notification failed: {e}");
        }
    }
}
