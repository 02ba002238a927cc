//! Telegram adapter (teloxide).
//!
//! Implements the `syncer-core` MirrorPort over the Telegram Bot API and feeds
//! decoded updates into the mirroring pipeline.

use async_trait::async_trait;

use teloxide::{prelude::*, types::InputFile};

use tokio::time::sleep;

pub mod convert;
pub mod handlers;
pub mod router;

use syncer_core::{
    domain::{ChatId, MessageId},
    errors::Error,
    messaging::{
        port::MirrorPort,
        types::{MediaKind, MediaRef},
    },
    Result,
};

/// Sends a cached media file by reference, with optional caption and reply.
macro_rules! send_cached {
    ($this:expr, $method:ident, $chat:expr, $file_id:expr, $caption:expr, $reply_to:expr) => {
        $this
            .with_retry(|| {
                let mut req = $this.bot.$method($chat, InputFile::file_id($file_id.to_string()));
                if let Some(c) = $caption {
                    req = req.caption(c.to_string());
                }
                if let Some(r) = $reply_to {
                    req = req
                        .reply_to_message_id(Self::tg_msg_id(r))
                        .allow_sending_without_reply(true);
                }
                req
            })
            .await?
    };
}

#[derive(Clone)]
pub struct TelegramMirror {
    bot: Bot,
}

impl TelegramMirror {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    /// `sendSticker` takes the reply target as a bare integer.
    fn sticker_request(
        &self,
        chat_id: ChatId,
        file_id: &str,
        reply_to: Option<MessageId>,
    ) -> <Bot as Requester>::SendSticker {
        let mut req = self
            .bot
            .send_sticker(Self::tg_chat(chat_id), InputFile::file_id(file_id.to_string()));
        if let Some(r) = reply_to {
            req = req
                .reply_to_message_id(r.0)
                .allow_sending_without_reply(true);
        }
        req
    }

    fn sent(msg: &Message) -> Option<MessageId> {
        Some(MessageId(msg.id.0))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// One best-effort retry after a flood-wait; everything else surfaces.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(wait_secs = d.as_secs(), "telegram flood wait, retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MirrorPort for TelegramMirror {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        link_preview: bool,
    ) -> Result<Option<MessageId>> {
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .disable_web_page_preview(!link_preview);
                if let Some(r) = reply_to {
                    req = req
                        .reply_to_message_id(Self::tg_msg_id(r))
                        .allow_sending_without_reply(true);
                }
                req
            })
            .await?;
        Ok(Self::sent(&msg))
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>> {
        let chat = Self::tg_chat(chat_id);
        let file_id = media.file_id.as_str();
        let msg = match media.kind {
            MediaKind::Photo => send_cached!(self, send_photo, chat, file_id, caption, reply_to),
            MediaKind::Video => send_cached!(self, send_video, chat, file_id, caption, reply_to),
            MediaKind::Animation => {
                send_cached!(self, send_animation, chat, file_id, caption, reply_to)
            }
            MediaKind::Document => {
                send_cached!(self, send_document, chat, file_id, caption, reply_to)
            }
            MediaKind::Voice => send_cached!(self, send_voice, chat, file_id, caption, reply_to),
        };
        Ok(Self::sent(&msg))
    }

    async fn send_sticker(
        &self,
        chat_id: ChatId,
        file_id: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>> {
        let msg = self
            .with_retry(|| self.sticker_request(chat_id, file_id, reply_to))
            .await?;
        Ok(Self::sent(&msg))
    }

    /// The Bot API forwards one message per request; ids are forwarded in
    /// order and a failure part way returns the prefix that made it.
    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let res = self
                .with_retry(|| {
                    self.bot.forward_message(
                        Self::tg_chat(to),
                        Self::tg_chat(from),
                        Self::tg_msg_id(id),
                    )
                })
                .await;
            match res {
                Ok(msg) => out.push(MessageId(msg.id.0)),
                Err(e) if !out.is_empty() => {
                    tracing::warn!(
                        origin_id = id.0,
                        forwarded = out.len(),
                        requested = ids.len(),
                        "forward stopped part way: {e}"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn edit_text(&self, chat_id: ChatId, id: MessageId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(Self::tg_chat(chat_id), Self::tg_msg_id(id), text.to_string())
        })
        .await?;
        Ok(())
    }

    async fn edit_caption(&self, chat_id: ChatId, id: MessageId, caption: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_caption(Self::tg_chat(chat_id), Self::tg_msg_id(id))
                .caption(caption.to_string())
        })
        .await?;
        Ok(())
    }

    /// Deletes one by one; every id is attempted and the first error is returned.
    async fn delete_messages(&self, chat_id: ChatId, ids: &[MessageId]) -> Result<()> {
        let mut first_err = None;
        for &id in ids {
            let res = self
                .with_retry(|| {
                    self.bot
                        .delete_message(Self::tg_chat(chat_id), Self::tg_msg_id(id))
                })
                .await;
            if let Err(e) = res {
                tracing::warn!(target_id = id.0, "delete failed: {e}");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn send_notification(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_message(Self::tg_chat(chat_id), text.to_string())
                .disable_notification(true)
        })
        .await?;
        Ok(())
    }
}
