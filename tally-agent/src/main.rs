use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tally_core::{HttpTransport, SessionDetails, TallyConfig, TallyError, Transport};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use tally_agent::demo::FighterDemo;
use tally_agent::SessionSync;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "tally.toml")]
    config: String,

    /// Allocate a dashboard session and exit
    #[arg(long)]
    probe: bool,

    /// Account alias reported by the example host
    #[arg(long, default_value = "demo-account")]
    alias: String,

    /// Game cycle length of the example host, in milliseconds
    #[arg(long, default_value_t = 600)]
    cycle_ms: u64,
}

fn connect(config: &TallyConfig) -> Result<Arc<dyn Transport>, TallyError> {
    if config.service.token.is_empty() {
        return Err(TallyError::Other(
            "no token configured: set [service] token or TALLY__SERVICE__TOKEN".to_string(),
        ));
    }
    Ok(Arc::new(HttpTransport::from_config(config)?))
}

fn launch(
    config: &TallyConfig,
    transport: Arc<dyn Transport>,
    fighter: &Arc<FighterDemo>,
) -> Result<SessionSync, TallyError> {
    let session = SessionSync::new(config.clone(), transport, fighter.clone(), fighter.setup());
    let safe = fighter.clone();
    session.start(config.service.token.clone(), move || safe.is_safe_to_stop())?;
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (TALLY__SERVICE__TOKEN etc.)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match TallyConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let transport = connect(&config)?;

    if args.probe {
        let details = SessionDetails::new(config.service.token.clone(), &config.identity);
        match transport.open_session(&details).await {
            Ok(id) => println!("✅ Dashboard reachable, session id {}", id),
            Err(e) => {
                println!("❌ Dashboard probe failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let fighter = Arc::new(FighterDemo::new(args.alias.clone()));
    let session = launch(&config, transport, &fighter)?;

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let mut host_loop = tokio::spawn(fighter.run(
        session.clone(),
        Duration::from_millis(args.cycle_ms),
        tx.subscribe(),
    ));

    let mut shutdown = tx.subscribe();
    tokio::select! {
        _ = shutdown.recv() => session.shutdown(),
        _ = &mut host_loop => tracing::info!("Host loop ended"),
    }

    session.join().await;
    Ok(())
}
