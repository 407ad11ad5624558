//! CLI command implementations

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::AllowAll;
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineDeps};
use crate::http_server::HttpServer;
use crate::notify::{ChannelNotifier, NotificationReceiver};
use crate::observability::{LogEvent, Logger};
use crate::workflow::{reviewer_for, RevisionWorker};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config, data_path } => init(&config, data_path.as_deref()),
        Command::Serve { config, port } => serve(&config, port),
    }
}

/// Write a default configuration; never overwrites an existing file
pub fn init(config_path: &Path, data_path: Option<&Path>) -> CliResult<()> {
    if config_path.exists() {
        return Err(CliError::already_initialized(config_path.display()));
    }

    let config = EngineConfig {
        data_path: data_path.map(Path::to_path_buf),
        ..EngineConfig::default()
    };
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(config_path, serde_json::to_string_pretty(&config)?)?;

    println!("Wrote {}", config_path.display());
    Ok(())
}

/// Load config, open the store, run the worker and serve HTTP until Ctrl-C
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = EngineConfig::load(config_path)?;
    if let Some(port) = port {
        config.http.bind.set_port(port);
        config.validate()?;
    }
    let path = config_path.display().to_string();
    Logger::info(LogEvent::ConfigLoaded, &[("path", path.as_str())]);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async move {
        let (notifier, receiver) = ChannelNotifier::new();
        let deps = EngineDeps::open(&config, Arc::new(AllowAll), Arc::new(notifier))?;
        let engine = Arc::new(Engine::new(&config, deps));

        tokio::spawn(drain_notifications(receiver));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = if config.worker.enabled {
            let worker = RevisionWorker::new(
                Arc::clone(&engine),
                reviewer_for(config.worker.resolution),
                config.worker.clone(),
            );
            Some(Arc::new(worker).spawn(shutdown_rx))
        } else {
            None
        };

        let server = HttpServer::new(engine, &config.http);
        let served = server
            .start(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;

        Logger::info(LogEvent::ShutdownStart, &[]);
        let _ = shutdown_tx.send(true);
        if let Some(handle) = worker {
            let _ = handle.await;
        }

        served.map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Transport is external; the consumer only records hand-off
async fn drain_notifications(mut receiver: NotificationReceiver) {
    while let Some(notification) = receiver.recv().await {
        let user = notification.user_id.to_string();
        let event = notification.event_id.to_string();
        Logger::trace(
            LogEvent::NotificationDelivered,
            &[
                ("channel", notification.channel.as_str()),
                ("event_id", event.as_str()),
                ("kind", notification.kind.as_str()),
                ("user_id", user.as_str()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("tickerwatch.json");
        let store = dir.path().join("tw.db");

        init(&path, Some(&store)).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.data_path, Some(store));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickerwatch.json");
        fs::write(&path, "{}").unwrap();

        let err = init(&path, None).unwrap_err();
        assert_eq!(err.code_str(), "TW_CLI_ALREADY_INITIALIZED");
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_serve_rejects_port_zero_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickerwatch.json");
        fs::write(&path, "{}").unwrap();

        let err = serve(&path, Some(0)).unwrap_err();
        assert_eq!(err.code_str(), "TW_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_serve_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickerwatch.json");
        fs::write(&path, r#"{"worker": {"batch_size": 0}}"#).unwrap();

        let err = serve(&path, None).unwrap_err();
        assert_eq!(err.code_str(), "TW_CLI_CONFIG_ERROR");
    }
}
