/// Telegram chat id (numeric, Bot API form).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl ChatId {
    /// Bot API ids for channels and supergroups are the MTProto channel id
    /// prefixed with `-100`.
    pub fn from_channel_id(channel_id: i64) -> Self {
        Self(-(channel_id + 1_000_000_000_000))
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// A persisted origin → target correlation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdMapping {
    pub origin_id: MessageId,
    pub target_id: MessageId,
}
