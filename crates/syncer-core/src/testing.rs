//! Recording `MirrorPort` fake and message builders shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    config::ChannelConfig,
    domain::{ChatId, MessageId},
    errors::Error,
    messaging::{
        port::MirrorPort,
        types::{Content, EditedMessage, MediaKind, MediaRef, NewMessage},
    },
    Result,
};

pub const SOURCE: ChatId = ChatId(-1001);
pub const TARGET: ChatId = ChatId(-1002);
pub const DIVIDER: &str = "divider-sticker";

pub fn channel() -> ChannelConfig {
    ChannelConfig {
        listen_group: SOURCE,
        fwd_to: TARGET,
        split_sticker: Some(DIVIDER.to_string()),
    }
}

pub fn new_text(id: i32, text: &str) -> NewMessage {
    NewMessage {
        id: MessageId(id),
        chat_id: SOURCE,
        reply_to_id: None,
        content: Content::text(text),
        is_forward: false,
    }
}

pub fn new_reply(id: i32, reply_to: i32, text: &str) -> NewMessage {
    NewMessage {
        reply_to_id: Some(MessageId(reply_to)),
        ..new_text(id, text)
    }
}

pub fn new_forward(id: i32) -> NewMessage {
    NewMessage {
        is_forward: true,
        ..new_text(id, "forwarded")
    }
}

pub fn new_photo(id: i32, caption: Option<&str>) -> NewMessage {
    NewMessage {
        content: Content::media(
            MediaKind::Photo,
            format!("photo-{id}"),
            caption.map(str::to_string),
        ),
        ..new_text(id, "")
    }
}

pub fn new_divider(id: i32) -> NewMessage {
    NewMessage {
        content: Content::Sticker {
            file_id: DIVIDER.to_string(),
        },
        ..new_text(id, "")
    }
}

pub fn edited(id: i32, content: Content) -> EditedMessage {
    EditedMessage {
        id: MessageId(id),
        chat_id: SOURCE,
        content,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Text {
        chat: ChatId,
        text: String,
        reply_to: Option<MessageId>,
    },
    Media {
        chat: ChatId,
        media: MediaRef,
        caption: Option<String>,
        reply_to: Option<MessageId>,
    },
    Sticker {
        chat: ChatId,
        file_id: String,
        reply_to: Option<MessageId>,
    },
    Forward {
        to: ChatId,
        from: ChatId,
        ids: Vec<MessageId>,
    },
    EditText {
        chat: ChatId,
        id: MessageId,
        text: String,
    },
    EditCaption {
        chat: ChatId,
        id: MessageId,
        caption: String,
    },
    Delete {
        chat: ChatId,
        ids: Vec<MessageId>,
    },
    Notify {
        chat: ChatId,
        text: String,
    },
}

/// Records every outbound call. Target ids are allocated from 1000 upwards.
pub struct FakePort {
    next_id: Mutex<i32>,
    pub calls: Mutex<Vec<Call>>,
    /// Drop this many ids from the end of every forward result.
    pub forward_shortfall: Mutex<usize>,
    pub fail_forward: Mutex<bool>,
    pub fail_sends: Mutex<bool>,
    pub fail_edits: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
}

impl Default for FakePort {
    fn default() -> Self {
        Self {
            next_id: Mutex::new(1000),
            calls: Mutex::new(Vec::new()),
            forward_shortfall: Mutex::new(0),
            fail_forward: Mutex::new(false),
            fail_sends: Mutex::new(false),
            fail_edits: Mutex::new(false),
            fail_delete: Mutex::new(false),
        }
    }
}

impl FakePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn forwards(&self) -> Vec<Vec<MessageId>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Forward { ids, .. } => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Notify { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn alloc(&self) -> MessageId {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageId(id)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(flag: &Mutex<bool>, what: &str) -> Result<()> {
        if *flag.lock().unwrap() {
            return Err(Error::External(format!("{what}: FLOOD_WAIT_X")));
        }
        Ok(())
    }
}

#[async_trait]
impl MirrorPort for FakePort {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        _link_preview: bool,
    ) -> Result<Option<MessageId>> {
        Self::check(&self.fail_sends, "send_text")?;
        self.record(Call::Text {
            chat: chat_id,
            text: text.to_string(),
            reply_to,
        });
        Ok(Some(self.alloc()))
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &MediaRef,
        caption: Option<&str>,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>> {
        Self::check(&self.fail_sends, "send_media")?;
        self.record(Call::Media {
            chat: chat_id,
            media: media.clone(),
            caption: caption.map(str::to_string),
            reply_to,
        });
        Ok(Some(self.alloc()))
    }

    async fn send_sticker(
        &self,
        chat_id: ChatId,
        file_id: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Option<MessageId>> {
        Self::check(&self.fail_sends, "send_sticker")?;
        self.record(Call::Sticker {
            chat: chat_id,
            file_id: file_id.to_string(),
            reply_to,
        });
        Ok(Some(self.alloc()))
    }

    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>> {
        Self::check(&self.fail_forward, "forward_messages")?;
        self.record(Call::Forward {
            to,
            from,
            ids: ids.to_vec(),
        });
        let shortfall = *self.forward_shortfall.lock().unwrap();
        let returned = ids.len().saturating_sub(shortfall);
        Ok((0..returned).map(|_| self.alloc()).collect())
    }

    async fn edit_text(&self, chat_id: ChatId, id: MessageId, text: &str) -> Result<()> {
        Self::check(&self.fail_edits, "edit_text")?;
        self.record(Call::EditText {
            chat: chat_id,
            id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn edit_caption(&self, chat_id: ChatId, id: MessageId, caption: &str) -> Result<()> {
        Self::check(&self.fail_edits, "edit_caption")?;
        self.record(Call::EditCaption {
            chat: chat_id,
            id,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn delete_messages(&self, chat_id: ChatId, ids: &[MessageId]) -> Result<()> {
        Self::check(&self.fail_delete, "delete_messages")?;
        self.record(Call::Delete {
            chat: chat_id,
            ids: ids.to_vec(),
        });
        Ok(())
    }

    async fn send_notification(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.record(Call::Notify {
            chat: chat_id,
            text: text.to_string(),
        });
        Ok(())
    }
}
