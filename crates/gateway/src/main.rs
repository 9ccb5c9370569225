use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rosterwatch_domain::config::{Config, ConfigSeverity};
use rosterwatch_engine::feed::{DataFeed, HttpDataFeed};
use rosterwatch::api;
use rosterwatch::cli::{Cli, Command, ConfigCommand};
use rosterwatch::scheduler;
use rosterwatch::state::AppState;
use rosterwatch_store::transport::github::GithubTransport;
use rosterwatch_store::ContentStoreTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = rosterwatch::cli::load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let (config, config_path) = rosterwatch::cli::load_config()?;
            let passed = rosterwatch::cli::doctor::run(&config, &config_path).await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Tick) => {
            init_tracing();
            let (config, _config_path) = rosterwatch::cli::load_config()?;
            let state = build_state(Arc::new(config))?;
            let summary = scheduler::tick(&state).await;
            match summary {
                Some(s) => {
                    tracing::info!(
                        cleanup_deleted = s.cleanup_deleted,
                        presence_transitioned = s.presence_transitioned,
                        quarterly_enqueued = s.quarterly_enqueued,
                        audit_processed = s.audit_processed,
                        "tick complete"
                    );
                }
                None => tracing::info!("tick skipped: already in flight"),
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = rosterwatch::cli::load_config()?;
            let valid = rosterwatch::cli::config::validate(&config, &config_path);
            if !valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = rosterwatch::cli::load_config()?;
            rosterwatch::cli::config::show(&config);
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for commands that stay running).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rosterwatch=debug")),
        )
        .json()
        .init();
}

fn build_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    let transport: Arc<dyn ContentStoreTransport> =
        Arc::new(GithubTransport::new(&config.github, token).context("initializing GitHub transport")?);

    let feed: Arc<dyn DataFeed> = Arc::new(HttpDataFeed::new(
        config.feed.feed_url.clone(),
        config.feed.members_base_url.clone(),
        config.feed.connections_base_url.clone(),
    ));

    Ok(AppState {
        config,
        transport,
        feed,
        tick_in_flight: Arc::new(AtomicBool::new(false)),
    })
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("rosterwatch starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let state = build_state(config.clone())?;
    tracing::info!(repo = %config.github.repo, "content store transport ready");
    tracing::info!(feed_url = %config.feed.feed_url, "data feed ready");

    {
        let state = state.clone();
        tokio::spawn(scheduler::run_forever(state));
    }
    tracing::info!(
        interval_secs = config.schedule.tick_interval_secs,
        "scheduler started"
    );

    let cors_layer = build_cors_layer(&config.server.allowed_origins);

    let app = api::router()
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding to {}", config.server.bind_addr))?;

    tracing::info!(addr = %config.server.bind_addr, "rosterwatch listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may contain a trailing `*` wildcard for the port segment
/// (e.g. `http://localhost:*`). These are expanded into a predicate that
/// matches any port on that host. A literal `"*"` allows all origins.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    use axum::http::header;

    if allowed_origins.len() == 1 && allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in allowed_origins {
        if let Some(prefix) = origin.strip_suffix('*') {
            wildcard_prefixes.push(prefix.to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(86_400))
}
