use crate::domain::{ChatId, MessageId};

/// Inbound update model produced by the client adapter.
///
/// Client-specific fields stay in the adapter; the pipeline only sees these.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    New(NewMessage),
    Edited(EditedMessage),
    Deleted(DeletedMessages),
}

impl InboundEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            InboundEvent::New(m) => m.chat_id,
            InboundEvent::Edited(m) => m.chat_id,
            InboundEvent::Deleted(m) => m.chat_id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InboundEvent::New(_) => "new",
            InboundEvent::Edited(_) => "edit",
            InboundEvent::Deleted(_) => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub reply_to_id: Option<MessageId>,
    pub content: Content,
    /// Set when the message was itself forwarded from elsewhere.
    pub is_forward: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditedMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub content: Content,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeletedMessages {
    pub chat_id: ChatId,
    pub ids: Vec<MessageId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
    Voice,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
            MediaKind::Voice => "voice",
        }
    }
}

/// An opaque reference to media already stored by the messaging service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

/// Message payload, classified once at the adapter boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    Text { text: String, link_preview: bool },
    Media { media: MediaRef, caption: Option<String> },
    Sticker { file_id: String },
    Unrecognized,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text {
            text: text.into(),
            link_preview: false,
        }
    }

    pub fn media(kind: MediaKind, file_id: impl Into<String>, caption: Option<String>) -> Self {
        Content::Media {
            media: MediaRef {
                kind,
                file_id: file_id.into(),
            },
            caption,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Content::Text { .. } => "text",
            Content::Media { media, .. } => media.kind.as_str(),
            Content::Sticker { .. } => "sticker",
            Content::Unrecognized => "unrecognized",
        }
    }

    pub fn sticker_file_id(&self) -> Option<&str> {
        match self {
            Content::Sticker { file_id } => Some(file_id),
            _ => None,
        }
    }
}
