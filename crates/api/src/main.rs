//! Binary entry point: loads `AppConfig`, opens the database pool, runs
//! migrations, wires the default (in-memory/fake) collaborators into
//! `AppState`, spawns the transfer/offer expiry sweeper, and serves the
//! HTTP API until ctrl-c. Modeled on autopilot's `start()`/`run()` split
//! (init tracing and metrics first, then build the service), simplified to
//! this binary's single config file instead of a large flattened
//! `clap::Parser` tree — nothing here needs per-flag overrides beyond the
//! config path and bind address.

use {
    api::AppState,
    clap::Parser,
    notifications::Dispatcher,
    rate_limit::Limiter,
    s3::InMemoryUploader,
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::sync::oneshot,
};

/// CLI overrides layered over the TOML config (spec.md §6's ambient config
/// layer). Kept deliberately small: everything else lives in `AppConfig`.
#[derive(clap::Parser)]
struct Arguments {
    /// Path to the TOML config file.
    #[clap(long, env, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Overrides `AppConfig::bind_addr` when set.
    #[clap(long, env)]
    bind_addr: Option<std::net::SocketAddr>,

    /// `tracing-subscriber` env-filter fallback when `RUST_LOG` is unset.
    #[clap(long, env, default_value = "info")]
    log_filter: String,

    /// Path to the NSN catalog snapshot consumed by `catalog::Catalog`. If
    /// omitted the service starts with an empty catalog, which degrades
    /// every ingested line to `VerificationReason::CatalogLookupFailed`
    /// rather than failing to start.
    #[clap(long, env)]
    catalog_path: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Arguments::parse();
    observe::init_tracing(&args.log_filter);

    let config = configs::AppConfig::load(&args.config)
        .unwrap_or_else(|err| panic!("failed to load config from {:?}: {err}", args.config));

    tracing::info!(bind_addr = ?config.bind_addr, "starting property-registry api");

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections.get())
        .connect(config.database.write_url.as_str())
        .await
        .expect("connect to postgres");

    database::run_migrations(&pool)
        .await
        .expect("run database migrations");

    let catalog = match &args.catalog_path {
        Some(path) => catalog::Catalog::load_from_path(path)
            .unwrap_or_else(|err| panic!("failed to load catalog from {path:?}: {err}")),
        None => catalog::Catalog::load_from_reader(std::io::Cursor::new(
            b"INC|ITEM_NAME|FSC|NIIN\n" as &[u8],
        ))
        .expect("header-only catalog reader always parses"),
    };
    let catalog: Arc<dyn catalog::CatalogLookup> = Arc::new(catalog::CachedCatalog::new(
        catalog,
        Duration::from_secs(3600),
        10_000,
    ));

    let ocr: Arc<dyn ingestion::ocr::OcrClient> = Arc::new(ingestion::ocr::FakeOcrClient {
        result: ingestion::ocr::OcrFormResult::default(),
    });
    let ocr_limiter = Arc::new(Limiter::per_minute(config.ocr_rate_limit_per_minute));
    let uploader: Arc<dyn s3::Uploader> = Arc::new(InMemoryUploader::default());
    let dispatcher = Dispatcher::default();

    let offer_horizon_days = (config.offer_horizon.as_secs() / (24 * 60 * 60)).max(1) as i64;

    let state = AppState {
        pool: pool.clone(),
        catalog,
        ocr,
        ocr_limiter,
        uploader,
        dispatcher,
        default_offer_horizon_days: offer_horizon_days,
        metrics: observe::metrics_registry(),
    };

    let transfer_horizon = chrono::Duration::from_std(config.transfer_horizon)
        .expect("transfer_horizon fits in a chrono::Duration");
    let sweeper_pool = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match transfers::sweep_expired(&sweeper_pool, transfer_horizon).await {
                Ok((transfers, offers)) if transfers > 0 || offers > 0 => {
                    tracing::info!(transfers, offers, "swept expired transfers and offers");
                }
                Ok(_) => {}
                Err(err) => tracing::error!(%err, "failed to sweep expired transfers/offers"),
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
        let _ = shutdown_tx.send(());
    });

    let bind_addr = args.bind_addr.unwrap_or(config.bind_addr);
    api::serve(bind_addr, state, shutdown_rx)
        .await
        .expect("http server exited with an error");
}
