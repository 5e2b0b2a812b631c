//! arbscan: command line client for the arbitrage scanner backend.
//!
//! ```text
//!   CLI command
//!       │
//!       ▼
//!   DataService ──── license throttle
//!       │
//!       ▼
//!   ResilientClient ── circuit breaker (per endpoint)
//!       │              retry + backoff
//!       │              timeout per attempt
//!       ▼
//!   backend API
//! ```
//!
//! `pairs` and `watch` filter and sort client-side, from flags or the
//! user's saved settings. `watch` keeps polling and runs the connectivity
//! monitor, which clears all endpoint error state once the network comes
//! back.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use arbscan::api::{DataService, License, PairView, SortField, SortOrder};
use arbscan::config::{load_config, validation::validate_config, ClientConfig, ConfigError};
use arbscan::health::ConnectivityMonitor;
use arbscan::http::ResilientClient;
use arbscan::lifecycle::{unless_stopped, Shutdown};
use arbscan::observability::logging::init_logging;
use arbscan::observability::metrics::init_metrics;

#[derive(Parser)]
#[command(name = "arbscan")]
#[command(about = "Query cross-exchange arbitrage opportunities", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override api.base_url
    #[arg(short = 'u', long)]
    base_url: Option<String>,

    /// Override observability.log_level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Client-side filtering and ordering of pairs.
#[derive(Args, Debug)]
struct PairArgs {
    /// Start from the filter and ordering saved in the user's settings
    #[arg(long)]
    from_settings: bool,

    /// Minimum spread, percent
    #[arg(long)]
    spread_min: Option<f64>,
    /// Maximum spread, percent
    #[arg(long)]
    spread_max: Option<f64>,
    /// Minimum available volume, USD
    #[arg(long)]
    volume_min: Option<f64>,
    /// Maximum available volume, USD
    #[arg(long)]
    volume_max: Option<f64>,
    /// Minimum opportunity age, minutes
    #[arg(long)]
    time_min: Option<f64>,
    /// Maximum opportunity age, minutes
    #[arg(long)]
    time_max: Option<f64>,

    /// Base coin to keep (repeatable)
    #[arg(long = "coin")]
    coins: Vec<String>,
    /// Buy exchange to keep (repeatable)
    #[arg(long = "buy-exchange")]
    buy_exchanges: Vec<String>,
    /// Sell exchange to keep (repeatable)
    #[arg(long = "sell-exchange")]
    sell_exchanges: Vec<String>,

    /// coin, network, spread or profit
    #[arg(long)]
    sort: Option<SortField>,
    /// asc or desc
    #[arg(long)]
    order: Option<SortOrder>,
}

impl PairArgs {
    /// Flags override whatever `view` already holds.
    fn apply_to(&self, mut view: PairView) -> PairView {
        let filter = &mut view.filter;
        let bounds = [
            (&mut filter.spread_min, self.spread_min),
            (&mut filter.spread_max, self.spread_max),
            (&mut filter.volume_min, self.volume_min),
            (&mut filter.volume_max, self.volume_max),
            (&mut filter.time_min, self.time_min),
            (&mut filter.time_max, self.time_max),
        ];
        for (slot, flag) in bounds {
            if flag.is_some() {
                *slot = flag;
            }
        }
        if !self.coins.is_empty() {
            filter.coins = self.coins.clone();
        }
        if !self.buy_exchanges.is_empty() {
            filter.buy_exchanges = self.buy_exchanges.clone();
        }
        if !self.sell_exchanges.is_empty() {
            filter.sell_exchanges = self.sell_exchanges.clone();
        }
        if let Some(field) = self.sort {
            view.sort_field = field;
        }
        if let Some(order) = self.order {
            view.sort_order = order;
        }
        view
    }

    async fn resolve(&self, service: &DataService, user_id: Option<i64>) -> PairView {
        let base = match (self.from_settings, user_id) {
            (true, Some(id)) => service.get_pair_view(id).await,
            (true, None) => {
                tracing::warn!("--from-settings needs --user-id, using defaults");
                PairView::default()
            }
            (false, _) => PairView::default(),
        };
        self.apply_to(base)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List active arbitrage pairs
    Pairs {
        #[arg(long)]
        user_id: Option<i64>,
        #[command(flatten)]
        view: PairArgs,
    },
    /// List exchanges
    Exchanges,
    /// List coins
    Coins,
    /// Show a user
    User { telegram_id: i64 },
    /// Register a user
    Register {
        telegram_id: i64,
        #[arg(long)]
        username: Option<String>,
    },
    /// Mark a user as active now
    Touch { telegram_id: i64 },
    /// Show a user's license
    License { telegram_id: i64 },
    /// Replace a user's license
    SetLicense {
        telegram_id: i64,
        /// License type, e.g. Free or Pro
        #[arg(long = "type")]
        license_type: String,
        /// Store the license as inactive
        #[arg(long)]
        inactive: bool,
        #[arg(long)]
        expires_at: Option<String>,
    },
    /// Show a user's settings
    Settings { telegram_id: i64 },
    /// Replace a user's settings with a JSON object
    SetSettings { telegram_id: i64, json: String },
    /// Show a user's notifications
    Notifications { telegram_id: i64 },
    /// Replace a user's notification settings with a JSON object
    SetNotifications { telegram_id: i64, json: String },
    /// Pin a pair for a user
    Pin { pair_id: String, user_id: i64 },
    /// Unpin a pair for a user
    Unpin { pair_id: String, user_id: i64 },
    /// Poll pairs until interrupted
    Watch {
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        interval_secs: Option<u64>,
        #[command(flatten)]
        view: PairArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability.log_level);

    tracing::debug!(
        base_url = %config.api.base_url,
        request_timeout_ms = config.timeouts.request_ms,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    let client = ResilientClient::new(&config)?;
    let service = DataService::new(client, &config);

    match cli.command {
        Commands::Pairs { user_id, view } => {
            let view = view.resolve(&service, user_id).await;
            let mut snapshot = service.get_pairs(user_id).await;
            view.apply(&mut snapshot, Utc::now());
            print_json(&snapshot)?
        }
        Commands::Exchanges => print_json(&service.get_exchanges().await)?,
        Commands::Coins => print_json(&service.get_coins().await)?,
        Commands::User { telegram_id } => print_json(&service.get_user(telegram_id).await?)?,
        Commands::Register {
            telegram_id,
            username,
        } => print_json(&service.create_user(telegram_id, username.as_deref()).await?)?,
        Commands::Touch { telegram_id } => {
            print_json(&service.update_last_active(telegram_id).await)?
        }
        Commands::License { telegram_id } => {
            print_json(&service.get_user_license(telegram_id).await)?
        }
        Commands::SetLicense {
            telegram_id,
            license_type,
            inactive,
            expires_at,
        } => {
            let license = License {
                license_type,
                is_active: !inactive,
                expires_at: expires_at.map(Value::String),
                extra: Default::default(),
            };
            print_json(&service.update_user_license(telegram_id, &license).await)?
        }
        Commands::Settings { telegram_id } => {
            print_json(&service.get_user_settings(telegram_id).await)?
        }
        Commands::SetSettings { telegram_id, json } => {
            let settings: Value = serde_json::from_str(&json)?;
            print_json(&service.update_user_settings(telegram_id, &settings).await)?
        }
        Commands::Notifications { telegram_id } => {
            print_json(&service.get_user_notifications(telegram_id).await)?
        }
        Commands::SetNotifications { telegram_id, json } => {
            let settings: Value = serde_json::from_str(&json)?;
            print_json(&service.update_notification_settings(telegram_id, &settings).await)?
        }
        Commands::Pin { pair_id, user_id } => {
            print_json(&service.pin_pair(&pair_id, Some(user_id)).await)?
        }
        Commands::Unpin { pair_id, user_id } => {
            print_json(&service.unpin_pair(&pair_id, Some(user_id)).await)?
        }
        Commands::Watch {
            user_id,
            interval_secs,
            view,
        } => {
            let interval = Duration::from_secs(
                interval_secs.unwrap_or(config.polling.interval_secs).max(1),
            );
            let view = view.resolve(&service, user_id).await;
            watch(service, &config, user_id, view, interval).await?;
        }
    }

    Ok(())
}

async fn watch(
    service: DataService,
    config: &ClientConfig,
    user_id: Option<i64>,
    view: PairView,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());

    let monitor_task = match ConnectivityMonitor::new(service.clone(), config.connectivity.clone()) {
        Some(monitor) => {
            let rx = shutdown.subscribe();
            Some(tokio::spawn(monitor.run(rx)))
        }
        None => {
            tracing::warn!(base_url = %config.api.base_url, "No host to probe, connectivity monitor not started");
            None
        }
    };

    let mut stop = shutdown.subscribe();
    let signal = shutdown.clone();
    tokio::spawn(async move { signal.trigger_on_ctrl_c().await });

    tracing::info!(
        interval_secs = interval.as_secs(),
        sort = %view.sort_field,
        "Watching pairs"
    );

    let mut known_license = None;
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // a poll can spend several timeouts retrying
                match unless_stopped(&mut stop, poll_once(&service, user_id, &view, &mut known_license)).await {
                    Some(result) => result?,
                    None => break,
                }
            }
            _ = stop.recv() => break,
        }
    }

    if let Some(task) = monitor_task {
        let _ = task.await;
    }
    Ok(())
}

async fn poll_once(
    service: &DataService,
    user_id: Option<i64>,
    view: &PairView,
    known_license: &mut Option<License>,
) -> Result<(), serde_json::Error> {
    let mut snapshot = service.get_pairs(user_id).await;
    let received = snapshot.active_pairs.len();
    view.apply(&mut snapshot, Utc::now());
    tracing::info!(
        received,
        shown = snapshot.active_pairs.len(),
        pinned = snapshot.pinned_pairs.len(),
        "Pairs refreshed"
    );
    println!("{}", serde_json::to_string(&snapshot)?);

    let Some(id) = user_id else {
        return Ok(());
    };
    let Some(license) = service
        .check_license_with_throttling(id)
        .await
        .and_then(|envelope| envelope.license)
    else {
        return Ok(());
    };

    if let Some(previous) = known_license.as_ref() {
        if license.changed_from(previous) {
            tracing::info!(
                user_id = id,
                license_type = %license.license_type,
                is_active = license.is_active,
                "License changed"
            );
        }
    }
    if !license.grants_access() {
        tracing::warn!(user_id = id, "License does not grant access to pairs");
    }
    *known_license = Some(license);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let value: Value = serde_json::to_value(value)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
