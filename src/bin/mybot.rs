use anyhow::Result;
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::prelude::*;

use mybot::bus::{self, fatal_channel};
use mybot::config::{Config, load_rules_document};
use mybot::engine::ExpressionRegistry;
use mybot::lifecycle::Lifecycle;
use mybot::processor::Dispatcher;
use mybot::provider::{ProviderContext, SlackClient, TwitterClient};
use mybot::reporter::TracingErrorReporter;
use mybot::source::start_all;
use mybot::validation::Validator;

#[tokio::main]
async fn main() -> Result<()> {
    let version = mybot::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "mybot=info".into()),
    );

    // Configure output format based on environment
    let fmt_layer = if std::env::var("JSON_LOGS").is_ok() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_thread_names(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match load_rules_document(&config.config_path) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = Validator::validate_pipeline(&pipeline) {
        eprintln!("Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        version = %version,
        config_path = %config.config_path,
        sources = pipeline.sources.len(),
        rules = pipeline.rules.len(),
        "Starting mybot"
    );

    let http_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(*config.http_client_timeout.as_ref())
        .build()?;
    let stream_client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()?;

    let social = Arc::new(TwitterClient::new(
        config.social_api_base.as_ref(),
        config.social_token.as_ref(),
        http_client.clone(),
        stream_client,
    ));
    let chat = Arc::new(SlackClient::new(
        config.chat_api_base.as_ref(),
        config.chat_token.as_ref(),
        http_client.clone(),
    ));
    let context = Arc::new(ProviderContext::new(social, chat, http_client));
    let registry = Arc::new(ExpressionRegistry::with_defaults());

    let (fatal_tx, mut fatal_rx) = fatal_channel();
    let lifecycle = Lifecycle::new(fatal_tx);
    let (bus_sender, bus_receiver) = bus::channel(*config.bus_capacity.as_ref());

    if !pipeline.sources.iter().any(|source| source.is_enabled()) {
        tracing::warn!("No source is enabled, nothing will be dispatched");
    }

    // The dispatcher is the only reader of the bus; it runs before any source can emit
    let dispatcher = Dispatcher::new(
        pipeline.rules,
        registry,
        context.clone(),
        Arc::new(TracingErrorReporter::new()),
    );
    let mut dispatcher_handle = lifecycle.spawn_tracked("dispatcher", move |cancel| async move {
        dispatcher.run(bus_receiver, cancel).await
    });

    start_all(&pipeline.sources, &context, &bus_sender, &lifecycle);
    // Sources hold their own clones; the events channel closes once they are all gone
    drop(bus_sender);

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let mut exit_code = 0;
    let mut dispatcher_done = false;

    tokio::select! {
        Some(fatal) = fatal_rx.recv() => {
            tracing::error!(error = %fatal, "Fatal error, initiating shutdown");
            exit_code = 1;
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating shutdown");
        }
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating shutdown");
        }
        result = &mut dispatcher_handle => {
            dispatcher_done = true;
            match result {
                Ok(stats) if stats.never_listened() => {
                    tracing::error!(
                        source_errors = stats.source_errors,
                        "Every source stopped with errors before delivering an event"
                    );
                    exit_code = 1;
                }
                Ok(stats) => tracing::warn!(
                    events_seen = stats.events_seen,
                    source_errors = stats.source_errors,
                    "All sources finished, no source is running"
                ),
                Err(e) => {
                    tracing::error!(error = ?e, "Dispatcher task failed");
                    exit_code = 1;
                }
            }
        }
    }

    lifecycle.cancel();
    lifecycle.wait_for_all().await;

    if !dispatcher_done {
        let _ = dispatcher_handle.await;
    }

    tracing::info!("mybot stopped");

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
