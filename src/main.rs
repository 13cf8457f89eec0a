mod ad;
mod clock;
mod config;
mod id;
mod persistence;
mod service;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config = config::Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let store = config.open_store()?;
    let engine = service::AdEngine::new_shared(
        store.clone(),
        id::UuidGenerator::new_shared(),
        clock::SystemClock::new_shared(),
    );
    let query = service::AdQuery::new_shared(store);

    let svc_ctr = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctr = svc_ctr.clone();
        move || {
            info!("Stopping all services...");
            svc_ctr.stop_all();
        }
    })?;

    let ui = service::Ui::new(config.listen, service::AppState { engine, query })?;
    svc_ctr.spawn_loop(ui).join()?;

    info!("bye");
    Ok(())
}
