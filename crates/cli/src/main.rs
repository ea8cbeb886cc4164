mod pending_commands;

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

use {
    anyhow::Context as _,
    clap::{Parser, Subcommand},
    secrecy::{ExposeSecret, Secret},
    serenity::Client,
    tgbridge_bridge::{
        BridgeStore, HttpFeedSource, PendingCommands, Pipeline, PollScheduler, PostFormatter,
    },
    tgbridge_channels::{ChatOutbound, CommandSink},
    tgbridge_config::BridgeConfig,
    tgbridge_discord::{BridgeHandler, CommandSlot, SerenityOutbound},
    tgbridge_metrics::{MetricsRecorderConfig, init_metrics},
    tgbridge_telegram::{ImageHost, ImgbbClient, MediaResolver, MediaSource, TelegramSession},
    tokio::sync::watch,
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tgbridge", about = "tgbridge: Telegram channel feeds into Discord")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of tgbridge.toml/yaml/json).
    #[arg(long, global = true, env = "TGBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the mapping, posted-link and pending-post files.
    #[arg(long, global = true, env = "TGBRIDGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Discord bot token (overrides `[discord].token`).
    #[arg(long, global = true, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default when no subcommand is provided).
    Run,
    /// Inspect or release the pending-post queue without starting the bridge.
    Pending {
        #[command(subcommand)]
        action: pending_commands::PendingAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => tgbridge_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => tgbridge_config::discover_and_load(),
    };
    if let Some(dir) = &cli.data_dir {
        config.bridge.data_dir = dir.clone();
    }
    if let Some(token) = &cli.discord_token {
        config.discord.token = Some(Secret::new(token.clone()));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "tgbridge starting");
            init_metrics(MetricsRecorderConfig {
                enabled: config.metrics.enabled,
                listen: config.metrics.listen.clone(),
                global_labels: Vec::new(),
            })?;
            run_bridge(config).await
        },
        Some(Commands::Pending { action }) => {
            pending_commands::handle_pending(action, &config).await
        },
    }
}

async fn run_bridge(config: BridgeConfig) -> anyhow::Result<()> {
    let token = config
        .discord
        .token
        .clone()
        .context("no Discord token configured (set DISCORD_TOKEN or [discord].token)")?;

    let store = BridgeStore::open(&config.bridge).await?.into_shared();
    {
        let store = store.lock().await;
        if store.mappings().is_empty() {
            warn!(
                path = %config.bridge.mappings_path().display(),
                "no channel mappings configured, nothing will be bridged"
            );
        }
    }

    let credentials = tgbridge_config::load_credentials(&config.bridge.credentials_path());
    let media_timeout = Duration::from_secs(config.media.download_timeout_secs);

    let session = Arc::new(TelegramSession::new(
        credentials.telegram_bot_token.clone(),
        config.media.telegram_preview_base.clone(),
        media_timeout,
    )?);
    if let Err(e) = session.connect().await {
        warn!(error = %e, "telegram session unavailable, placeholder media will be dropped");
    }

    let host: Option<Arc<dyn ImageHost>> = match credentials.imgbb_api_key.clone() {
        Some(key) => Some(Arc::new(ImgbbClient::new(
            key,
            config.media.imgbb_endpoint.clone(),
            media_timeout,
        )?)),
        None => {
            info!("no imgbb api key configured, placeholder media will be dropped");
            None
        },
    };
    let resolver = MediaResolver::new(
        Arc::clone(&session) as Arc<dyn MediaSource>,
        host,
        config.media.temp_dir.clone(),
    );
    let formatter = Arc::new(PostFormatter::new(Some(Arc::new(resolver)))?);
    let feeds = Arc::new(HttpFeedSource::new(
        config.bridge.feed_url_template.clone(),
        Duration::from_secs(config.bridge.feed_timeout_secs),
    )?);

    let (ready_tx, ready_rx) = watch::channel(false);
    let commands: CommandSlot = Arc::new(OnceLock::new());
    let handler = BridgeHandler::new(
        config.discord.command_prefix.clone(),
        Arc::clone(&commands),
        ready_tx,
    );
    let mut client = Client::builder(token.expose_secret(), BridgeHandler::intents())
        .event_handler(handler)
        .await
        .context("failed to build the Discord client")?;

    let outbound: Arc<dyn ChatOutbound> = Arc::new(SerenityOutbound::new(
        Arc::clone(&client.http),
        Arc::clone(&client.cache),
    ));
    let entry_delay = Duration::from_millis(config.bridge.entry_delay_ms);

    let pending: Arc<dyn CommandSink> = Arc::new(PendingCommands::new(
        Arc::clone(&store),
        Arc::clone(&outbound),
        entry_delay,
    ));
    if commands.set(pending).is_err() {
        warn!("command sink was already installed");
    }

    let pipeline = Pipeline::new(Arc::clone(&store), feeds, outbound, formatter)
        .with_review_channels(config.bridge.review_channels.iter().cloned())
        .with_entry_delay(entry_delay);
    let cancel = CancellationToken::new();
    let scheduler = PollScheduler::new(
        Arc::new(pipeline),
        Duration::from_secs(config.bridge.poll_interval_secs),
    )
    .with_tick_timeout(config.bridge.tick_timeout_secs.map(Duration::from_secs))
    .spawn(ready_rx, cancel.clone());

    let shard_manager = Arc::clone(&client.shard_manager);
    let mut gateway = tokio::spawn(async move { client.start().await });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown requested");
        },
        result = &mut gateway => match result {
            Ok(Ok(())) => warn!("discord gateway stopped"),
            Ok(Err(e)) => error!(error = %e, "discord gateway failed"),
            Err(e) => error!(error = %e, "discord gateway task panicked"),
        },
    }

    cancel.cancel();
    if let Err(e) = scheduler.await {
        error!(error = %e, "poll scheduler task panicked");
    }
    shard_manager.shutdown_all().await;
    gateway.abort();

    store.lock().await.flush().await?;
    session.close().await;
    info!("tgbridge stopped");
    Ok(())
}
