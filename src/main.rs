use anyhow::Result;
use clap::Parser;

mod adapter;
mod app;
mod chain;
mod cli;
mod config;
mod error;
mod model;
mod monitor;
mod queue;
mod scheduler;
mod store;
mod template_expander;
mod throttle;
mod util;
mod worker;

pub use error::OrchestratorError;

use app::AppState;
use cli::{Cli, Commands};
use monitor::fs_watcher::FsWatcher;
use monitor::s3_poller::S3Poller;
use monitor::EventDispatcher;
use scheduler::Scheduler;
use worker::{Worker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CronValidate { expression } => match scheduler::validate_cron_expression(&expression) {
            Ok(()) => {
                println!("ok: '{expression}' is a valid cron expression");
                Ok(())
            }
            Err(e) => {
                eprintln!("invalid cron expression: {e}");
                std::process::exit(1);
            }
        },
        Commands::CronNext { expression, count } => {
            match scheduler::get_next_runs(&expression, chrono::Utc::now(), count) {
                Ok(runs) => {
                    for run in runs {
                        println!("{}", run.to_rfc3339());
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("invalid cron expression: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Run {} => run_daemon().await,
    }
}

async fn run_daemon() -> Result<()> {
    let config = config::AppConfig::from_env()?;
    let _tracing_guard = util::init_tracing(&config.state_dir)?;

    tracing::info!("starting orchestration daemon");

    let state = AppState::connect(config).await?;

    let worker = Worker::new(
        state.store.clone(),
        state.queue.clone(),
        state.adapter.clone(),
        state.throttle.clone(),
        WorkerConfig {
            throttle_acquire_timeout: state.config.throttle_acquire_timeout,
            ..WorkerConfig::default()
        },
    );
    let scheduler = Scheduler::new(state.store.clone(), state.queue.clone());
    let dispatcher = std::sync::Arc::new(EventDispatcher::new(state.store.clone(), state.queue.clone()));
    let fs_watcher = FsWatcher::new(state.store.clone(), dispatcher.clone());

    let s3_buckets = s3_buckets_from_templates(&state).await?;
    let aws_cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_cfg);
    let s3_poller = S3Poller::new(s3_client, dispatcher.clone(), state.config.s3_poll_interval);

    let worker_task = tokio::spawn(async move { worker.run().await });
    let scheduler_task = tokio::spawn(async move { scheduler.run().await });
    let fs_watcher_task = tokio::spawn(async move { fs_watcher.run().await });
    let s3_poller_task = tokio::spawn(async move { s3_poller.run(&s3_buckets).await });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping daemon tasks");

    worker_task.abort();
    scheduler_task.abort();
    fs_watcher_task.abort();
    s3_poller_task.abort();

    Ok(())
}

async fn s3_buckets_from_templates(state: &AppState) -> Result<Vec<String>> {
    use model::TemplateSourceConfig;

    let templates = state.store.list_active_templates().await?;
    let mut buckets: Vec<String> = templates
        .into_iter()
        .filter_map(|t| match t.source_config {
            TemplateSourceConfig::S3 { bucket, .. } => Some(bucket),
            _ => None,
        })
        .collect();
    buckets.sort();
    buckets.dedup();
    Ok(buckets)
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
