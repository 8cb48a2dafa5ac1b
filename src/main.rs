use anyhow::Result;
use clap::Parser;
use statuswatch::{analysis, cli, config, db, services, store};
use tokio_util::sync::CancellationToken;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,statuswatch=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing()?;

    let config = config::CoreConfig::from_env()?;
    let db = db::Db::open(&config.database_path)?;
    let store = store::StatusStore::new(db.clone());
    let http = reqwest::Client::new();
    let registry = analysis::Registry::load(&config, db, http.clone())?;

    match args.command {
        cli::Command::Fetch { analyses } => {
            let units = registry.select(&analyses)?;
            let summary =
                services::dispatch::run_due(&units, &store, config.pull_interval_minutes, chrono::Utc::now())
                    .await;
            tracing::info!(
                fetched = summary.fetched,
                skipped = summary.skipped,
                failed = summary.failed,
                "fetch round complete"
            );
        }
        cli::Command::Run { analyses } => {
            let units = registry.select(&analyses)?;
            let cancel = CancellationToken::new();
            let signal_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown signal received");
                    signal_cancel.cancel();
                }
            });

            services::driver::PeriodicDriver::new(config, units, store, http)
                .run(cancel)
                .await?;
        }
        cli::Command::Status => {
            let categories = services::rollup::collect_category_navs(
                registry.units(),
                &store,
                &config,
                chrono::Utc::now(),
                config.overview_range(),
            );
            println!("overall: {}", services::rollup::global_status(&categories));
            for category in &categories {
                println!("{}: {}", category.name, category.latest_status());
                for instance in &category.instances {
                    println!("  {}: {}", instance.verbose_name, instance.latest_status());
                }
            }
        }
    }

    Ok(())
}
