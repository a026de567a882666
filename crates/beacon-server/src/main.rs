use anyhow::Result;
use beacon_server::config::ServerConfig;
use beacon_server::management::NotificationService;
use beacon_server::scheduler::build_schedulers;
use beacon_server::seed;
use beacon_server::state::AppState;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  beacon-server [config.toml]                                   Start the schedulers");
    eprintln!("  beacon-server init <config.toml> <seed.json>                  Create channels and rules from seed file");
    eprintln!("  beacon-server send-test <config.toml> <app_id> <channel_id>   Send a test notification to one channel");
}

#[tokio::main]
async fn main() -> Result<()> {
    beacon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("beacon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init requires <seed.json> argument")
            })?;
            run_init(config_path, seed_path)
        }
        Some("send-test") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("send-test requires <config.toml>, <app_id> and <channel_id> arguments")
            })?;
            let app_id = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("send-test requires <app_id> argument")
            })?;
            let channel_id = args.get(4).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("send-test requires <channel_id> argument")
            })?;
            run_send_test(config_path, app_id, channel_id).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Create channels and rules for one app from a JSON seed file.
fn run_init(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let state = AppState::build(&config)?;
    let seed = seed::load_seed(seed_path)?;
    seed::apply_seed(&NotificationService::new(&state), &seed)?;
    Ok(())
}

async fn run_send_test(config_path: &str, app_id: &str, channel_id: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let state = AppState::build(&config)?;
    NotificationService::new(&state)
        .send_test(app_id, channel_id)
        .await?;
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        database = %config.database_path,
        query_engine = %config.query_engine.base_url,
        "beacon-server starting"
    );

    let state = AppState::build(&config)?;
    let schedulers = build_schedulers(&config, &state)?;

    let cancel = CancellationToken::new();
    let handles: Vec<_> = schedulers
        .into_iter()
        .map(|scheduler| tokio::spawn(scheduler.run(cancel.clone())))
        .collect();

    tracing::info!(schedulers = handles.len(), "Server started");

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }
    tracing::info!("Server stopped");

    Ok(())
}
