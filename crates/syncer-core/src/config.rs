use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, Result};

pub const DEFAULT_DATABASE_FILE: &str = "channel-no.db";
pub const DEFAULT_CONFIG_FILE: &str = "config.ini";

/// Source/target scopes shared by every pipeline component.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelConfig {
    /// Source scope being mirrored.
    pub listen_group: ChatId,
    /// Target scope receiving the mirror.
    pub fwd_to: ChatId,
    /// Divider sticker file id, relayed standalone and never grouped.
    pub split_sticker: Option<String>,
}

impl ChannelConfig {
    pub fn is_divider(&self, file_id: &str) -> bool {
        self.split_sticker.as_deref() == Some(file_id)
    }
}

/// Typed configuration for the syncer.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub channel: ChannelConfig,

    // Identity store
    pub database_file: PathBuf,

    // Batching
    pub batch_interval: Duration,

    // Operators allowed to issue commands regardless of chat role.
    pub admin_users: Vec<i64>,

    // Audit
    pub audit_log_path: Option<PathBuf>,
    pub audit_log_json: bool,
}

impl Config {
    /// Load from the process environment, after importing `.env` and the INI
    /// file (`CONFIG_FILE`, default `config.ini`) without overriding
    /// variables that are already set.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let ini_path = env_str("CONFIG_FILE").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        load_ini_if_present(Path::new(&ini_path));

        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("ACCOUNT_BOT_TOKEN"))
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let listen_group = required_chat(&get, "CHANNEL_LISTEN_GROUP")?;
        let fwd_to = required_chat(&get, "CHANNEL_FWD_TO")?;
        let split_sticker = get("CHANNEL_SPLIT_STICKER").and_then(non_empty);

        let database_file = get("DATABASE_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_FILE));

        let batch_interval = Duration::from_millis(
            get("BATCH_INTERVAL_MS")
                .or_else(|| get("CHANNEL_BATCH_INTERVAL_MS"))
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1500)
                .max(1),
        );

        let admin_users = parse_csv_i64(get("ADMIN_USERS").or_else(|| get("CHANNEL_ADMIN_USERS")));

        let audit_log_path = get("AUDIT_LOG_PATH")
            .or_else(|| get("AUDIT_LOG_FILE"))
            .and_then(non_empty)
            .map(PathBuf::from);
        let audit_log_json = get("AUDIT_LOG_JSON").map(|s| truthy(&s)).unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            channel: ChannelConfig {
                listen_group,
                fwd_to,
                split_sticker,
            },
            database_file,
            batch_interval,
            admin_users,
            audit_log_path,
            audit_log_json,
        })
    }
}

fn required_i64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<i64> {
    let raw = get(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} is required")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{key} must be an integer chat id, got {raw:?}")))
}

/// Bot API chat ids for channels and groups are negative. A positive value is
/// taken as a bare channel id (as shown in `t.me/c/<id>` links).
fn required_chat(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<ChatId> {
    let raw = required_i64(get, key)?;
    if raw > 0 {
        Ok(ChatId::from_channel_id(raw))
    } else {
        Ok(ChatId(raw))
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        set_env_default(key, &unquote(v.trim()));
    }
}

fn load_ini_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in parse_ini(&contents) {
        set_env_default(&key, &val);
    }
}

/// Flatten `[section] key = value` pairs into `SECTION_KEY` names.
fn parse_ini(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut section = String::new();

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = name.trim().to_string();
            continue;
        }

        let Some((k, v)) = line.split_once('=').or_else(|| line.split_once(':')) else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let name = if section.is_empty() {
            key.to_string()
        } else {
            format!("{section}_{key}")
        };
        out.push((
            name.replace(['.', '-'], "_").to_uppercase(),
            unquote(v.trim()),
        ));
    }
    out
}

fn set_env_default(key: &str, val: &str) {
    if env::var_os(key).is_some() {
        return; // do not override existing env
    }
    env::set_var(key, val);
}

fn unquote(val: &str) -> String {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return val[1..val.len() - 1].to_string();
    }
    val.to_string()
}

fn truthy(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
