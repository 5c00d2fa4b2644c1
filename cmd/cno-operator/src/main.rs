use clap::{Parser, ValueEnum};
use pkg_api::AppState;
use pkg_constants::api::DEFAULT_API_PORT;
use pkg_constants::controller::{DEFAULT_RESYNC_SECS, DEFAULT_WORKERS};
use pkg_constants::paths::{DEFAULT_OPERATOR_CONFIG, DEFAULT_OPERATOR_DATA_DIR};
use pkg_constants::state::EVENT_LOG_CAPACITY;
use pkg_controllers::{ControllerConfig, EnvironmentController};
use pkg_metrics::MetricsRegistry;
use pkg_state::client::StateStore;
use pkg_state::resource::ResourceStore;
use pkg_state::watch::EventLog;
use pkg_types::config::{LogFormat, OperatorConfigFile, load_config_file};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cno-operator", about = "Environment onboarding operator")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_OPERATOR_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Bearer token required by the API
    #[arg(long)]
    token: Option<String>,

    /// Environments reconciled concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds between full resyncs
    #[arg(long)]
    resync_secs: Option<u64>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,

    /// Keep state in memory only
    #[arg(long)]
    in_memory: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: OperatorConfigFile = load_config_file(&cli.config)?;

    // Merge: CLI args > config file > defaults
    let log_format = cli
        .log_format
        .map(LogFormat::from)
        .or(file_cfg.log_format)
        .unwrap_or_default();
    init_tracing(log_format);
    info!("Config file: {}", cli.config);

    let port = cli.port.or(file_cfg.port).unwrap_or(DEFAULT_API_PORT);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_OPERATOR_DATA_DIR.to_string());
    let token = cli.token.or(file_cfg.token).filter(|t| !t.is_empty());
    let workers = cli.workers.or(file_cfg.workers).unwrap_or(DEFAULT_WORKERS);
    let resync_secs = cli
        .resync_secs
        .or(file_cfg.resync_secs)
        .unwrap_or(DEFAULT_RESYNC_SECS);
    let in_memory = cli.in_memory || file_cfg.in_memory.unwrap_or(false);

    info!("Starting cno-operator");
    info!("  Port:      {}", port);
    info!("  Data dir:  {}", if in_memory { "(in-memory)" } else { data_dir.as_str() });
    info!("  Workers:   {}", workers);
    info!("  Resync:    {}s", resync_secs);
    match &token {
        Some(t) => info!("  Token:     {}***", t.chars().take(4).collect::<String>()),
        None => warn!("  Token:     none, API is unauthenticated"),
    }

    let event_log = EventLog::new(EVENT_LOG_CAPACITY);
    let state = if in_memory {
        StateStore::in_memory(event_log)
    } else {
        StateStore::new(&data_dir, event_log).await?
    };
    let store = ResourceStore::new(state.clone()).await?;
    let metrics = Arc::new(MetricsRegistry::with_operator_metrics());

    let controller = EnvironmentController::new(
        store.clone(),
        metrics.clone(),
        ControllerConfig {
            workers,
            resync_interval: Duration::from_secs(resync_secs.max(1)),
        },
    )
    .start();

    let app_state = AppState {
        store,
        metrics,
        token,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let served = pkg_api::server::serve(addr, app_state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    })
    .await;

    controller.shutdown().await;
    if let Err(e) = state.close().await {
        warn!("Failed to close state store: {}", e);
    }
    served
}
