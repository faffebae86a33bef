#![forbid(unsafe_code)]

use anpr_sync::{cli::Cli, seed::seed_cameras, signals::wait_for_signal};
use clap::Parser;
use config::Config;
use flume::bounded;
use orchestrator::processor::{HttpBackend, ProcessingBackend};
use orchestrator::{LiveSyncEngine, MemoryStore, RemoteStore, Services, SqliteStore, SystemClock};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbosity.tracing_level_filter().into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    debug!(config = ?cli);

    let mut config = match &cli.conffile {
        Some(path) => Config::load(path)?,
        _ => Config::new()?,
    };
    cli.apply(&mut config);

    if cli.dump_config {
        #[allow(clippy::print_stdout)]
        {
            println!("{}", config.to_toml()?);
        }
        return Ok(());
    }

    let store: Arc<dyn RemoteStore> = match &config.store.database {
        Some(path) => {
            info!(path = %path.display(), "opening sqlite store");
            Arc::new(SqliteStore::new(path.clone()).await?)
        }
        None => {
            info!("no database configured, keeping data in memory");
            Arc::new(MemoryStore::new())
        }
    };
    seed_cameras(store.as_ref()).await?;

    let backend: Option<Arc<dyn ProcessingBackend>> = if config.processor.enabled {
        match HttpBackend::new(&config.processor) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(err) => {
                warn!(error = %err, "processing backend unavailable, using local simulation");
                None
            }
        }
    } else {
        None
    };

    let mut engine = LiveSyncEngine::new(
        config,
        None,
        Services {
            store,
            backend,
            clock: Arc::new(SystemClock),
        },
    );

    let cancel = CancellationToken::new();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = bounded(8);

    tokio::spawn(async move {
        if let Err(err) = wait_for_signal(&events_tx).await {
            error!(error = ?err, "Error while waiting for signal");
        }
    });
    tokio::spawn(async move {
        while let Ok(event) = events_rx.recv_async().await {
            debug!(?event, "Received signal event");
            if control_tx.send(event.into()).is_err() {
                break;
            }
        }
    });
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received");
                    cancel.cancel();
                }
                Err(err) => error!(error = %err, "failed to listen for ctrl-c"),
            }
        });
    }

    let mut notices = engine.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => info!(level = ?notice.level, message = %notice.message, "notice"),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "notices dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.run_until(cancel, control_rx).await?;
    info!("stopped");
    Ok(())
}
