//! Append-only record of mirroring actions.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::MessageId, errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub origin_ids: Vec<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn new(event: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            origin_ids: Vec::new(),
            target_ids: Vec::new(),
            content_kind: None,
            error: None,
            context: None,
        }
    }

    pub fn forward(origins: &[MessageId], targets: &[MessageId]) -> Self {
        Self {
            origin_ids: ids(origins),
            target_ids: ids(targets),
            ..Self::new("forward")
        }
    }

    pub fn send(origin: MessageId, target: Option<MessageId>, content_kind: &str) -> Self {
        Self {
            origin_ids: vec![origin.0],
            target_ids: target.into_iter().map(|t| t.0).collect(),
            content_kind: Some(content_kind.to_string()),
            ..Self::new("send")
        }
    }

    pub fn divider(origin: MessageId, target: Option<MessageId>) -> Self {
        Self {
            origin_ids: vec![origin.0],
            target_ids: target.into_iter().map(|t| t.0).collect(),
            ..Self::new("divider")
        }
    }

    pub fn edit(origin: MessageId, target: MessageId, content_kind: &str) -> Self {
        Self {
            origin_ids: vec![origin.0],
            target_ids: vec![target.0],
            content_kind: Some(content_kind.to_string()),
            ..Self::new("edit")
        }
    }

    pub fn delete(origins: &[MessageId], targets: &[MessageId]) -> Self {
        Self {
            origin_ids: ids(origins),
            target_ids: ids(targets),
            ..Self::new("delete")
        }
    }

    pub fn error(context: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            context: Some(context.to_string()),
            ..Self::new("error")
        }
    }
}

fn ids(xs: &[MessageId]) -> Vec<i32> {
    xs.iter().map(|m| m.0).collect()
}

/// Audit sink. Without a path every write is a no-op.
#[derive(Clone, Debug, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
    json: bool,
}

impl AuditLog {
    pub fn new(path: Option<PathBuf>, json: bool) -> Self {
        Self { path, json }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Best-effort write; failures are logged, never returned.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!("audit write failed: {e}");
        }
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.to_string(),
        serde_json::Value::Array(xs) => xs
            .iter()
            .map(json_value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
