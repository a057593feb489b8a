//! Kairos CLI entry point — thin wiring only, mirroring the teacher's
//! `main.rs` shape: parse args, init tracing, load config, dispatch.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use kairos::config::Config;
use kairos::import::ImportDescription;
use kairos::repository::ProfileRepository;
use kairos::KairosApp;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kairos=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let parsed = cli::Cli::parse();

    let app = KairosApp::new();
    let mut profile = app.repos().get_profile().await?;
    profile.baseline_daily_min = config.baseline_daily_min;
    profile.buffer_pct = config.buffer_pct;
    app.repos().upsert_profile(profile).await?;

    if let Some(seed_path) = &config.store_seed_path {
        tracing::info!("seeding store from {}", seed_path);
        let raw = std::fs::read_to_string(seed_path)
            .with_context(|| format!("reading seed file '{seed_path}'"))?;
        let description: ImportDescription = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing seed file '{seed_path}' as YAML"))?;
        app.import_service()
            .import(description, chrono::Utc::now())
            .await
            .context("seeding store from KAIROS_STORE_SEED failed")?;
    }

    cli::run(parsed, &app, &config).await
}
