use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use namazu::{
    init_logging, ApiContext, ApiServer, LoggingMode, MemoryEventRepository,
    MemorySubscriptionStore, Pipeline, RelayConfig,
};
use namazu_stream::StreamClient;
use namazu_webhook::{Challenger, RetryingSender, WebhookSender};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Earthquake event relay
///
/// Streams P2PQuake earthquake reports and delivers them to registered
/// webhooks, signed with each subscriber's secret.
#[derive(Parser, Debug)]
#[command(name = "namazu")]
#[command(version)]
pub struct Args {
    /// Path to a TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Accept http://localhost webhook URLs (development only)
    #[arg(long)]
    pub allow_local_webhooks: bool,

    /// Log output: silent, development, json or debug
    #[arg(long, default_value = "development")]
    pub log_mode: LoggingMode,

    /// Do not start the management API
    #[arg(long)]
    pub no_api: bool,
}

impl Args {
    /// Load the configuration file and apply command-line overrides.
    fn relay_config(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if self.allow_local_webhooks {
            config.security.allow_local_webhooks = true;
        }
        if self.no_api {
            config.api.enabled = false;
        }

        config.validate().context("validating configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_mode).context("initializing logging")?;

    let config = args.relay_config()?;
    if config.security.allow_local_webhooks {
        warn!("Local webhook URLs are allowed; do not use this setting in production");
    }

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let subscriptions = Arc::new(MemorySubscriptionStore::new());
    let events = Arc::new(MemoryEventRepository::default());

    let api = if config.api.enabled {
        let context = ApiContext::new(
            subscriptions.clone(),
            Challenger::new().context("building challenge client")?,
            cancel.clone(),
        )
        .with_allow_local_webhooks(config.security.allow_local_webhooks)
        .with_challenge_timeout(config.challenge_timeout());
        Some(ApiServer::start(config.api_addr()?, context, &cancel)?)
    } else {
        info!("Management API disabled");
        None
    };

    let sender = WebhookSender::new(config.sender_config()).context("building webhook client")?;
    let source = StreamClient::new(config.stream_config());
    let mut pipeline = Pipeline::new(source, subscriptions, Arc::new(RetryingSender::new(sender)))
        .with_event_repository(events);

    let outcome = pipeline.run(&cancel).await;
    cancel.cancel();

    if let Some(api) = api {
        api.stop().await;
    }

    outcome.context("relay pipeline failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Cancel `cancel` on Ctrl-C, or SIGTERM on unix.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut terminate) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = terminate.recv() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("Shutdown requested");
        cancel.cancel();
    });
}
