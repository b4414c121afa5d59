use clap::Parser;
use log::{error, info, warn};
use power_watch_bot::commands::CommandHandler;
use power_watch_bot::config::{Config, load_dotenv};
use power_watch_bot::error::Result;
use power_watch_bot::instance_lock::InstanceLock;
use power_watch_bot::monitor::PowerMonitor;
use power_watch_bot::notifier::{MessageTransport, Notifier};
use power_watch_bot::power::simulation::run_power_simulation;
use power_watch_bot::power::{PowerSensor, SimulatedPowerSensor, SysfsPowerSensor};
use power_watch_bot::subscribers::SubscriberStore;
use power_watch_bot::telegram::TelegramClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "power-watch-bot")]
#[command(about = "Telegram bot that reports power outages and restorations")]
struct Cli {
    /// Seconds between power checks (overrides POLL_INTERVAL_SECS)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Subscriber list file (overrides SUBSCRIBERS_FILE)
    #[arg(long)]
    subscribers_file: Option<PathBuf>,

    /// Toggle a simulated power adapter instead of reading sysfs
    #[arg(long)]
    simulate: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper_util", log::LevelFilter::Warn)
        .format_timestamp_millis()
        .init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(secs) = cli.poll_interval {
        config.monitor.poll_interval = Duration::from_secs(secs);
    }
    if let Some(path) = &cli.subscribers_file {
        config.storage.subscribers_file = path.clone();
    }
    if cli.simulate {
        config.monitor.simulate = true;
    }
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn run(config: Config) -> Result<()> {
    let _lock = InstanceLock::acquire()?;

    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    let me = telegram.get_me().await?;
    info!(
        "Authorized as @{}",
        me.username.as_deref().unwrap_or(&me.first_name)
    );

    let subscribers = Arc::new(SubscriberStore::open(&config.storage.subscribers_file)?);
    info!("  Subscribers: {}", subscribers.len());
    info!("  Poll interval: {:?}", config.monitor.poll_interval);

    let cancel = CancellationToken::new();
    let transport: Arc<dyn MessageTransport> = telegram.clone();

    let mut simulation_task = None;
    let sensor: Arc<dyn PowerSensor> = if config.monitor.simulate {
        info!(
            "  Sensor: simulated (toggles every {:?})",
            config.monitor.simulation_period
        );
        let sim = Arc::new(SimulatedPowerSensor::new(true));
        simulation_task = Some(run_power_simulation(
            sim.clone(),
            config.monitor.simulation_period,
            cancel.clone(),
        ));
        sim
    } else {
        info!("  Sensor: sysfs power supply");
        Arc::new(SysfsPowerSensor::new())
    };

    let notifier = Notifier::new(transport.clone(), config.telegram.send_timeout);
    let monitor = PowerMonitor::new(
        sensor,
        notifier,
        subscribers.clone(),
        config.monitor.poll_interval,
    );
    let monitor_task = tokio::spawn(monitor.run(cancel.clone()));

    let (msg_tx, msg_rx) = mpsc::channel(100);
    let updates_cancel = cancel.clone();
    let updates_task = tokio::spawn(async move {
        telegram.run(msg_tx, updates_cancel).await;
    });

    let mut handler = CommandHandler::new(subscribers, transport);
    if let Some(username) = me.username {
        handler = handler.with_bot_username(username);
    }
    let commands_cancel = cancel.clone();
    let commands_task = tokio::spawn(async move {
        handler.run(msg_rx, commands_cancel).await;
    });

    warn!("Bot is starting...");
    shutdown_signal().await;
    info!("Received shutdown signal");

    cancel.cancel();
    for (name, task) in [
        ("monitor", monitor_task),
        ("updates", updates_task),
        ("commands", commands_task),
    ] {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    }
    if let Some(task) = simulation_task {
        let _ = task.await;
    }

    Ok(())
}

fn main() {
    // Before the runtime exists, so setting env vars is single-threaded
    load_dotenv();
    init_logger();
    let cli = Cli::parse();

    info!("Starting Power Watch Bot");

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }

    warn!("Bot stopped");
}
