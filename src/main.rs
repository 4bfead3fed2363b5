//! Rosterwatch - cache administration and health monitoring for the
//! student roster cache
//!
//! Logs go to stderr; command output goes to stdout.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rosterwatch::cache::CacheManager;
use rosterwatch::cli::{self, Cli, Command};
use rosterwatch::config::Config;
use rosterwatch::monitor::HealthMonitor;
use rosterwatch::service::StudentDataService;
use rosterwatch::upstream::GraphqlClient;

/// Installs the tracing subscriber; `LOG_FORMAT=json` selects JSON lines
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rosterwatch=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_service(config: &Config) -> StudentDataService {
    let client = GraphqlClient::new(config.backend_url.clone(), config.upstream_timeout);
    let cache = CacheManager::new(config.cache_file.clone(), config.cache_ttl_hours);
    StudentDataService::new(Arc::new(client), cache, config.known_empty(), config.retry)
}

async fn run_monitor(service: &StudentDataService, interval: Duration) {
    let monitor = HealthMonitor::new(service.health_checker());
    monitor.start(interval);
    println!(
        "Cache health monitor running every {}s. Press Ctrl+C to stop.",
        interval.as_secs()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    monitor.stop().await;
    println!("Cache health monitor stopped");
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    info!(cache_file = %config.cache_file.display(), backend = %config.backend_url, "Loaded configuration");

    let service = build_service(&config);

    match cli.command {
        Command::Monitor { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.standalone_check_interval())
                .max(Duration::from_secs(1));
            run_monitor(&service, interval).await;
        }
        ref command => print!("{}", ensure_newline(cli::execute(command, &service).await)),
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
