use teloxide::prelude::*;

use syncer_core::{
    domain::{ChatId, MessageId},
    messaging::types::{DeletedMessages, InboundEvent},
};

use crate::router::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Command {
    Toggle,
    Status,
    Delete(Vec<MessageId>),
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn recognize(text: &str, reply_to: Option<MessageId>) -> Option<Command> {
    let (cmd, args) = parse_command(text);
    match cmd.as_str() {
        "toggle" => Some(Command::Toggle),
        "status" => Some(Command::Status),
        "del" => {
            let mut ids: Vec<MessageId> = args
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter_map(|s| s.trim().parse::<i32>().ok())
                .map(MessageId)
                .collect();
            if ids.is_empty() {
                ids.extend(reply_to);
            }
            Some(Command::Delete(ids))
        }
        _ => None,
    }
}

/// Configured operators, chat owners/admins, and posts signed by the chat
/// itself (channel posts, anonymous group admins).
async fn is_privileged(bot: &Bot, msg: &Message, state: &AppState) -> bool {
    if msg.sender_chat().is_some_and(|c| c.id == msg.chat.id) {
        return true;
    }
    let Some(user) = msg.from() else {
        return false;
    };
    if state.cfg.admin_users.contains(&(user.id.0 as i64)) {
        return true;
    }
    match bot.get_chat_member(msg.chat.id, user.id).await {
        Ok(member) => member.kind.is_privileged(),
        Err(e) => {
            tracing::warn!(user_id = user.id.0, "chat member lookup failed: {e}");
            false
        }
    }
}

/// Returns `true` when the message was consumed as a command.
pub async fn handle_command(bot: &Bot, msg: &Message, state: &AppState) -> ResponseResult<bool> {
    let Some(text) = msg.text() else {
        return Ok(false);
    };
    let reply_to = msg.reply_to_message().map(|r| MessageId(r.id.0));
    let Some(cmd) = recognize(text, reply_to) else {
        return Ok(false);
    };
    if !is_privileged(bot, msg, state).await {
        tracing::debug!(command = text, "command from unprivileged sender, mirroring as text");
        return Ok(false);
    }

    let reply = match cmd {
        Command::Toggle => {
            if state.mirror.toggle() {
                "Mirroring enabled.".to_string()
            } else {
                "Mirroring disabled.".to_string()
            }
        }
        Command::Status => match state.mirror.status().await {
            Ok(s) => format!(
                "Mirroring {}.\nQueued: {}\nMapped messages: {}",
                if s.enabled { "enabled" } else { "disabled" },
                s.queued,
                s.mapped
            ),
            Err(e) => {
                tracing::error!("status lookup failed: {e}");
                "Status unavailable, see console to get more information.".to_string()
            }
        },
        Command::Delete(ids) if ids.is_empty() => {
            "Reply to a message with /del, or pass message ids.".to_string()
        }
        Command::Delete(ids) => {
            let count = ids.len();
            state
                .mirror
                .handle(InboundEvent::Deleted(DeletedMessages {
                    chat_id: ChatId(msg.chat.id.0),
                    ids,
                }))
                .await;
            format!("Delete requested for {count} message(s).")
        }
    };

    if let Err(e) = bot
        .send_message(msg.chat.id, reply)
        .reply_to_message_id(msg.id)
        .disable_notification(true)
        .await
    {
        tracing::warn!(chat_id = msg.chat.id.0, "command reply failed: {e}");
    }
    Ok(true)
}
