use std::sync::Arc;

use syncer_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), syncer_core::Error> {
    syncer_core::logging::init("syncer")?;

    let cfg = Arc::new(Config::load()?);

    syncer_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| syncer_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
