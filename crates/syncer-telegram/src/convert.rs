//! teloxide `Message` → pipeline event conversion.

use teloxide::types::{Message, MessageEntityKind};

use syncer_core::{
    domain::{ChatId, MessageId},
    messaging::types::{Content, EditedMessage, MediaKind, NewMessage},
};

pub fn new_message(msg: &Message) -> NewMessage {
    NewMessage {
        id: MessageId(msg.id.0),
        chat_id: ChatId(msg.chat.id.0),
        reply_to_id: msg.reply_to_message().map(|r| MessageId(r.id.0)),
        content: classify_content(msg),
        is_forward: msg.forward().is_some(),
    }
}

pub fn edited_message(msg: &Message) -> EditedMessage {
    EditedMessage {
        id: MessageId(msg.id.0),
        chat_id: ChatId(msg.chat.id.0),
        content: classify_content(msg),
    }
}

/// Classification order: photo, video, animation, document, text, voice,
/// sticker. Anything else has nothing to mirror.
pub fn classify_content(msg: &Message) -> Content {
    let caption = || msg.caption().map(str::to_string);

    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        return Content::media(MediaKind::Photo, largest.file.id.clone(), caption());
    }
    if let Some(video) = msg.video() {
        return Content::media(MediaKind::Video, video.file.id.clone(), caption());
    }
    if let Some(animation) = msg.animation() {
        return Content::media(MediaKind::Animation, animation.file.id.clone(), caption());
    }
    if let Some(document) = msg.document() {
        return Content::media(MediaKind::Document, document.file.id.clone(), caption());
    }
    if let Some(text) = msg.text() {
        return Content::Text {
            text: text.to_string(),
            link_preview: has_link(msg),
        };
    }
    if let Some(voice) = msg.voice() {
        return Content::media(MediaKind::Voice, voice.file.id.clone(), caption());
    }
    if let Some(sticker) = msg.sticker() {
        return Content::Sticker {
            file_id: sticker.file.id.clone(),
        };
    }
    Content::Unrecognized
}

fn has_link(msg: &Message) -> bool {
    msg.entities().is_some_and(|entities| {
        entities.iter().any(|e| {
            matches!(
                e.kind,
                MessageEntityKind::Url | MessageEntityKind::TextLink { .. }
            )
        })
    })
}
