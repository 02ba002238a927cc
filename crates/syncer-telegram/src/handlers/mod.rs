//! Telegram update handlers.
//!
//! Each handler converts a decoded update into a pipeline event and hands it
//! to the mirror. Operator commands are intercepted before conversion.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use syncer_core::messaging::types::InboundEvent;

use crate::{convert, router::AppState};

mod commands;

/// New messages and channel posts.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.chat.id.0 != state.mirror.channel().listen_group.0 {
        return Ok(());
    }

    if msg.text().is_some_and(|t| t.starts_with('/'))
        && commands::handle_command(&bot, &msg, &state).await?
    {
        return Ok(());
    }

    state
        .mirror
        .handle(InboundEvent::New(convert::new_message(&msg)))
        .await;
    Ok(())
}

/// Edited messages and edited channel posts.
pub async fn handle_edited_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    state
        .mirror
        .handle(InboundEvent::Edited(convert::edited_message(&msg)))
        .await;
    Ok(())
}
