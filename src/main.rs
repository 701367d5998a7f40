// =============================================================================
// Factorec - Main Entry Point
// =============================================================================
//
// Author: arkSong (arksong2018@gmail.com)
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Entry point of the factorec binary. Loads configuration, installs
//   tracing and dispatches the CLI subcommand.
//
// =============================================================================

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use factorec::{
    api::{self, handlers::RecommendResponse},
    clap::{self, Commands},
    engine::{
        FileInteractionSource, ModelStore, RecommendationEngine, RetrainParams, RetrainScheduler,
    },
    init_tracing, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = clap::parse();

    let mut config = Config::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from the environment".to_string(),
    })?;
    if let Some(level) = args.log_level {
        config.log = level;
    }

    init_tracing(&config.log);
    info!("🚀 Factorec {}", clap::version());
    if let Some(path) = &args.config {
        info!("📁 Using configuration file: {}", path.display());
    }

    match args.command {
        Commands::Serve {
            address,
            port,
            no_schedule,
        } => {
            if let Some(address) = address {
                config.address = address;
                info!("📡 Address override from CLI: {}", config.address);
            }
            if let Some(port) = port {
                config.port = port;
                info!("🔌 Port override from CLI: {}", config.port);
            }
            if no_schedule {
                config.engine.schedule.enabled = false;
            }
            run_server(config).await
        }

        Commands::Train {
            from_file,
            max_components,
            max_iter,
        } => {
            let engine = match from_file {
                Some(path) => {
                    info!("📁 Training from export file {}", path.display());
                    let store = Arc::new(ModelStore::from_config(&config.engine.store));
                    RecommendationEngine::new(
                        config.engine,
                        Arc::new(FileInteractionSource::new(path)),
                        store,
                    )
                }
                None => RecommendationEngine::from_config(config.engine)?,
            };
            let report = engine
                .retrain(RetrainParams {
                    max_components,
                    max_iter,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Recommend { user_id, top_n } => {
            let engine = RecommendationEngine::from_config(config.engine)?;
            let outcome = engine.recommend(user_id, top_n).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&RecommendResponse::from(outcome))?
            );
            Ok(())
        }

        Commands::Stats => {
            let engine = RecommendationEngine::from_config(config.engine)?;
            let stats = engine.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }

        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Run the HTTP service until Ctrl-C
async fn run_server(config: Config) -> Result<()> {
    let start = Instant::now();
    let addr = config.socket_addr();

    let engine = Arc::new(RecommendationEngine::from_config(config.engine.clone())?);
    if let Err(e) = engine.warm_up().await {
        warn!("⚠️ Persisted model could not be loaded: {}", e);
    }

    let mut scheduler = if config.engine.schedule.enabled {
        let mut scheduler = RetrainScheduler::new(&config.engine.schedule, Arc::clone(&engine));
        scheduler.start()?;
        Some(scheduler)
    } else {
        info!("⏸️ Scheduled retraining disabled");
        None
    };

    info!("✅ Service initialized in {:?}", start.elapsed());
    let served = api::serve(addr, engine, shutdown_signal()).await;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await;
    }

    match served {
        Ok(()) => {
            info!("✅ Server shutdown completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Server crashed: {}", e);
            Err(e).context("HTTP server failed")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutting down server");
}
