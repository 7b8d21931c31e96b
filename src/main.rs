use anyhow::Result;
use glucowatch_bridge_lib::config::SessionConfig;
use glucowatch_bridge_lib::core::{
    BluetoothManager, JsonLinesObserver, LoggingObserver, SessionObserver, SessionOptions,
    SessionRunner, SessionStateMachine,
};
use glucowatch_bridge_lib::logging;
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config_dir = SessionConfig::default_dir()?;
    let config = SessionConfig::load_config(&config_dir).await?;
    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    info!("Using config directory {:?}", config_dir);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let central = BluetoothManager::new(&config, events_tx).await?;

    let observers: Vec<Box<dyn SessionObserver + Send>> = vec![
        Box::new(LoggingObserver),
        Box::new(JsonLinesObserver::new(std::io::stdout())),
    ];
    let machine = SessionStateMachine::new(central, observers, SessionOptions::from_config(&config));
    let mut runner = SessionRunner::new(machine, events_rx);
    runner.machine_mut().start_scan();

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    let machine = runner.run(cancel_token).await;
    info!(
        "Session ended: {}, manufacturer {:?}, last reading {:?}",
        machine.connection_state(),
        machine.device_info().manufacturer_name,
        machine.latest_reading().map(|r| r.value)
    );
    Ok(())
}
