//! Manetu Policy Engine PDP entry point.
//!
//! Loads configuration, initializes logging, loads the PolicyDomain file
//! and builds the decision pipeline, then starts the selected frontend
//! (`generic` HTTP or `envoy` ExtAuthz) and waits for an interrupt to
//! trigger a graceful shutdown.

mod auxdata;
mod cli;
mod config;
mod error;
mod extauthz_server;
mod http_server;
mod lifecycle;
mod openapi;

use crate::auxdata::AuxData;
use crate::cli::{parse_serve_args, Protocol, ServeArgs};
use crate::config::Config;
use crate::lifecycle::Lifecycle;
use decision_engine::DecisionEngine;
use policy_domain::loader::load_policy_domain;
use policy_eval::CedarPolicyEvaluator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    if let Err(err) = config.validate() {
        eprintln!("invalid configuration: {err}");
        std::process::exit(1);
    }
    initialize_logging(&config);

    let args = match parse_serve_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config, args).await {
        error!(error = %err, "startup failed");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("failed to read policy domain file '{path}': {source}")]
    PolicyDomainIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    PolicyDomainLoad(#[from] policy_domain::LoadError),
    #[error(transparent)]
    Auxdata(#[from] auxdata::AuxDataError),
    #[error(transparent)]
    Selector(#[from] policy_domain::error::SelectorError),
    #[error(transparent)]
    Http(#[from] error::AppError),
}

async fn run(config: Config, args: ServeArgs) -> Result<(), StartupError> {
    let policy_domain_path = args
        .policy_domain
        .clone()
        .unwrap_or_else(|| "policy-domain.yaml".to_string());
    let source = std::fs::read(&policy_domain_path).map_err(|source| StartupError::PolicyDomainIo {
        path: policy_domain_path.clone(),
        source,
    })?;
    let im = load_policy_domain(&source)?;
    info!(path = %policy_domain_path, "policy domain loaded");

    let auxdata_path = args.auxdata.clone().or_else(|| config.auxdata.path.clone());
    let auxdata = match auxdata_path {
        Some(path) => Arc::new(AuxData::load(&path)?),
        None => Arc::new(AuxData::empty()),
    };

    let (sink, mut drain) = access_log::BoundedChannelSink::new(config.access_log.depth);
    tokio::spawn(async move {
        while let Some(record) = drain.recv().await {
            info!(
                sub = %record.principal_sub,
                operation = %record.operation,
                resource = %record.resource,
                allow = record.allow,
                "access log record"
            );
        }
    });

    let engine = Arc::new(
        DecisionEngine::new(Arc::new(im), CedarPolicyEvaluator::default(), Arc::new(sink))
            .map_err(StartupError::Selector)?,
    );

    // Held until after shutdown so the ExtAuthz supervisor's inbox channel
    // stays open for the process lifetime; a real wire adapter (tonic,
    // whatever frontend lands here) would hold the sender instead of this.
    let mut inbox_tx_keepalive = None;

    let lifecycle = match args.protocol {
        Protocol::Generic => {
            let port = args.port.unwrap_or(config.server.port);
            let addr = format!("{}:{}", config.server.host, port);
            let (lifecycle, bound) = http_server::start(
                &addr,
                engine,
                auxdata,
                Duration::from_secs(config.server.request_timeout_secs),
            )
            .await?;
            info!(%bound, "generic HTTP PDP server listening");
            lifecycle
        }
        Protocol::Envoy => {
            let (inbox_tx, inbox_rx) = mpsc::channel(64);
            inbox_tx_keepalive = Some(inbox_tx);
            let extauthz_config = extauthz_server::ExtAuthzConfig {
                service_name: args.name.unwrap_or_else(|| "envoy".to_string()),
                ..extauthz_server::ExtAuthzConfig::default()
            };
            let lifecycle = extauthz_server::start(inbox_rx, engine, auxdata, extauthz_config);
            info!("envoy ExtAuthz PDP supervisor started");
            lifecycle
        }
    };

    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight requests");
    lifecycle.stop(SHUTDOWN_DEADLINE).await;
    drop(inbox_tx_keepalive);
    info!("shut down gracefully");
    Ok(())
}

fn initialize_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mpe_pdp={}", config.logging.level)));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received ctrl-c"),
        _ = terminate => warn!("received SIGTERM"),
    }
}
