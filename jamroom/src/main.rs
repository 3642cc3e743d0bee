mod http;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use jamroom_core::{
    bootstrap::load_config,
    logging,
    models::{AccountTier, Identity, UserId},
    service::{JwtService, TierQuotaResolver},
};
use jamroom_sync::{sync::ConnectionLimits, Coordinator};

use http::AppState;
use server::JamroomServer;

/// Collaborative listening room coordinator
#[derive(Debug, Parser)]
#[command(name = "jamroom", version, about)]
struct Args {
    /// Path to the YAML/TOML config file
    #[arg(long, short)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the server (default)
    Serve,
    /// Mint an access token signed with the configured secret, for local testing
    Token {
        /// User id to embed in the token
        #[arg(long)]
        user: String,
        /// Subscription tier: free, premium or family
        #[arg(long, default_value = "premium")]
        tier: AccountTier,
        #[arg(long, default_value_t = 60)]
        ttl_minutes: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let jwt = Arc::new(JwtService::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.leeway_seconds,
    )?);

    if let Some(Command::Token {
        user,
        tier,
        ttl_minutes,
    }) = args.command
    {
        let identity = Identity::new(UserId::from(user), tier);
        let token = jwt.sign_token(&identity, chrono::Duration::minutes(ttl_minutes))?;
        println!("{token}");
        return Ok(());
    }

    logging::init_logging(&config.logging)?;
    info!("Jamroom server starting...");
    info!("HTTP address: {}", config.http_address());
    info!(
        free = config.rooms.free_quota,
        premium = config.rooms.premium_quota,
        family = config.rooms.family_quota,
        "Room size quotas loaded"
    );

    let limits = ConnectionLimits::from(&config.connection_limits);
    info!(
        max_per_user = limits.max_per_user,
        max_total = limits.max_total,
        idle_timeout_secs = limits.idle_timeout.as_secs(),
        keepalive_secs = limits.keepalive_interval.as_secs(),
        "Connection limits configured"
    );

    let quota = Arc::new(TierQuotaResolver::new(config.rooms.clone()));
    let coordinator = Arc::new(Coordinator::new(limits, quota));

    let state = AppState {
        coordinator,
        verifier: jwt,
        max_message_size: config.server.max_message_size,
    };

    JamroomServer::new(config, state).start().await
}
