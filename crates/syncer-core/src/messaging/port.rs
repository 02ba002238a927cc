use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId},
    messaging::types::MediaRef,
    Result,
};

/// Outbound operations the pipeline needs from the messaging client.
///
/// Send operations return `None` when the client accepted the call but
/// produced no message (nothing to map).
#[async_trait]
pub trait MirrorPort: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        link_preview: bool,
    ) -> Result<Option<MessageId>>;

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>>;

    async fn send_sticker(
        &self,
        chat_id: ChatId,
        file_id: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>>;

    /// Forward `ids` from `from` into `to`, returning the new ids in request order.
    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>>;

    async fn edit_text(&self, chat_id: ChatId, id: MessageId, text: &str) -> Result<()>;
    async fn edit_caption(&self, chat_id: ChatId, id: MessageId, caption: &str) -> Result<()>;

    async fn delete_messages(&self, chat_id: ChatId, ids: &[MessageId]) -> Result<()>;

    /// Silent operator-facing notice.
    async fn send_notification(&self, chat_id: ChatId, text: &str) -> Result<()>;
}
