use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wanptek_scpi::arbiter::CommandArbiter;
use wanptek_scpi::config::Config;
use wanptek_scpi::detect;
use wanptek_scpi::monitor::StatusMonitor;
use wanptek_scpi::server::ScpiServer;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level);

    info!("Starting WANPTEK SCPI server v{}", env!("CARGO_PKG_VERSION"));

    let mut session = detect::detect(&config.detect_options())
        .context("No WANPTEK power supply found")?;
    info!("{}", session.device_info());
    let status = session
        .read_status()
        .context("Failed to read initial status")?;
    info!("Status: {status}");

    let arbiter = CommandArbiter::spawn(session).context("Failed to start device worker")?;
    let _monitor = match config.monitor_interval() {
        Some(interval) => Some(
            StatusMonitor::spawn(arbiter.clone(), interval, |_| {})
                .context("Failed to start status monitor")?,
        ),
        None => None,
    };
    let server = ScpiServer::bind(config.listen.as_str(), arbiter)
        .with_context(|| format!("Failed to listen on {}", config.listen))?;
    info!("Connect with: telnet <host> {}", server.local_addr()?.port());
    server.run();
    Ok(())
}
