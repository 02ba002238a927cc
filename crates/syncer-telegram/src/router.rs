use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio_util::sync::CancellationToken;

use syncer_core::{
    audit::AuditLog, config::Config, messaging::port::MirrorPort, pipeline::Mirror,
    store::IdStore,
};

use crate::handlers;
use crate::TelegramMirror;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub mirror: Arc<Mirror>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        tracing::info!("syncer started: @{}", me.username());
    }

    let store = Arc::new(IdStore::new(cfg.database_file.clone()));
    // Fail fast on an unusable database file.
    let mapped = store.len().await?;
    tracing::info!(
        listen_group = cfg.channel.listen_group.0,
        fwd_to = cfg.channel.fwd_to.0,
        database = %store.path().display(),
        mapped,
        "mirroring configured"
    );

    let port: Arc<dyn MirrorPort> = Arc::new(TelegramMirror::new(bot.clone()));
    let audit = AuditLog::new(cfg.audit_log_path.clone(), cfg.audit_log_json);
    if let Some(path) = audit.path() {
        tracing::info!(path = %path.display(), json = cfg.audit_log_json, "audit log enabled");
    }
    let mirror = Arc::new(Mirror::new(cfg.channel.clone(), port, store, audit));

    let cancel = CancellationToken::new();
    let grouper = tokio::spawn(mirror.grouper(cfg.batch_interval).run(cancel.clone()));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        mirror,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_channel_post().endpoint(handlers::handle_message))
        .branch(Update::filter_edited_message().endpoint(handlers::handle_edited_message))
        .branch(Update::filter_edited_channel_post().endpoint(handlers::handle_edited_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Let the grouper finish its current tick and flush what is queued.
    cancel.cancel();
    grouper.await?;
    tracing::info!("syncer stopped");

    Ok(())
}
