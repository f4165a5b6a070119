//! courtsync WebSocket server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin courtsync-server -- --token dev-a=alice --token dev-b=bob
//! COURTSYNC_TOKENS=dev-a=alice,dev-b=bob REDIS_URL=redis://127.0.0.1:6379 cargo run --bin courtsync-server
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use courtsync::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "courtsync-server")]
#[command(about = "Room-scoped real-time state sync server", long_about = None)]
struct Args {
    /// Address to bind the WebSocket listener to
    #[arg(long, env = "COURTSYNC_BIND", default_value = "0.0.0.0:8000")]
    bind: String,

    /// Redis-compatible mirror store; in-process mirror when absent
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Accepted credentials as `token=player` (repeatable or comma-separated)
    #[arg(
        long = "token",
        env = "COURTSYNC_TOKENS",
        value_delimiter = ',',
        value_parser = parse_token
    )]
    tokens: Vec<(String, String)>,

    /// Seconds without a heartbeat before a player is evicted
    #[arg(long, default_value_t = 60)]
    stale_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value_t = 10)]
    reap_secs: u64,

    /// Milliseconds between coalesced state broadcasts
    #[arg(long, default_value_t = 50)]
    coalesce_ms: u64,

    /// Ball velocity damping per second
    #[arg(long, default_value_t = 0.03)]
    damping: f64,
}

impl Args {
    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            stale_timeout: Duration::from_secs(self.stale_secs),
            reap_interval: Duration::from_secs(self.reap_secs),
            coalesce_interval: Duration::from_millis(self.coalesce_ms),
            damping: self.damping,
            ..RoomConfig::default()
        }
    }
}

fn parse_token(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((token, player)) if !token.is_empty() && !player.is_empty() => {
            Ok((token.to_owned(), player.to_owned()))
        }
        _ => Err(format!("expected token=player, got {raw:?}")),
    }
}

fn setup_logger(default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), CourtError> {
    setup_logger("info");

    let args = Args::parse();

    if args.tokens.is_empty() {
        tracing::warn!("no tokens configured; every connection will be rejected");
    }
    let tokens = TokenTable::from_pairs(args.tokens.clone());

    match &args.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => {
                let store = Arc::new(store);
                let result = serve(&args, Arc::clone(&store), tokens).await;
                if let Err(e) = store.close().await {
                    tracing::debug!(error = %e, "mirror close failed");
                }
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "mirror store unreachable; using in-process mirror");
                serve(&args, Arc::new(MemoryStore::new()), tokens).await
            }
        },
        None => serve(&args, Arc::new(MemoryStore::new()), tokens).await,
    }
}

async fn serve<S: MirrorStore>(
    args: &Args,
    store: Arc<S>,
    tokens: TokenTable,
) -> Result<(), CourtError> {
    let server = CourtServer::builder()
        .bind(&args.bind)
        .room_config(args.room_config())
        .mirror(store)
        .decoder(tokens)
        .build()
        .await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received");
                shutdown.shutdown();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });

    server.run().await
}
