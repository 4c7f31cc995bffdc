//! LMS Server - schema install, seeding and inspection.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lms_server::model::dto_json;
use lms_server::{ensure_seeded, Args, Command, Gateway, PersistenceGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lms_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting LMS server");

    let (config, command) = Args::parse().into_config();

    tracing::info!(
        data_path = %config.data_path.display(),
        flush_every_ms = ?config.flush_every_ms,
        "configuration loaded"
    );

    // Opening installs the registry schema when it differs from the stored one.
    let gateway = Gateway::open(&config)?;
    tracing::info!(
        schema_version = gateway.database().schema_version(),
        "database opened"
    );

    let blocking = gateway.clone();
    let seed = config.seed.clone();
    tokio::task::spawn_blocking(move || run(&blocking, &seed, command)).await??;

    gateway.database().flush()?;
    Ok(())
}

fn run(
    gateway: &Gateway,
    seed: &lms_server::SeedConfig,
    command: Command,
) -> Result<(), lms_server::Error> {
    match command {
        Command::Init => {
            let outcome = ensure_seeded(gateway, seed)?;
            tracing::info!(?outcome, "initialization complete");
        }
        Command::Stats => {
            for (entity, count) in gateway.stats()? {
                println!("{:<14}{}", entity, count);
            }
        }
        Command::Get { entity, id } => {
            let row = gateway.get(&entity, id)?;
            let json = dto_json(&row)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json)
                    .map_err(|e| lms_server::Error::Database(e.to_string()))?
            );
        }
        Command::Delete { entity, id } => {
            let result = gateway.delete(&entity, id)?;
            tracing::info!(
                %entity,
                id,
                cascaded = result.cascaded.len(),
                "deleted"
            );
            for (child, child_id) in result.cascaded {
                println!("removed {} {}", child, child_id);
            }
        }
    }
    Ok(())
}
