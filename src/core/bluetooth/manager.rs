//! Bluetooth manager for the GlucoWatch bridge
//! This module provides the bluest-backed central controller the session
//! state machine drives.

use std::time::Duration;

use anyhow::{anyhow, Result};
use bluest::Adapter;
use log::info;
use tokio::task::JoinHandle;

use crate::config::session_config::SessionConfig;
use crate::core::bluetooth::central::{CentralController, EventSender, Generation};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::registry::GattRegistry;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralHandle, ServiceHandle};

/// Owns the platform radio and every handle obtained from it
pub struct BluetoothManager {
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Notification handler
    notification_handler: NotificationHandler,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager posting its outcomes to `events`
    pub async fn new(config: &SessionConfig, events: EventSender) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let registry = GattRegistry::shared();
        let scanner = BluetoothScanner::new(
            adapter.clone(),
            registry.clone(),
            events.clone(),
            Duration::from_secs(config.scan_timeout_secs),
        );
        let connection_manager = ConnectionManager::new(
            adapter,
            registry.clone(),
            events.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        );
        let notification_handler = NotificationHandler::new(registry, events);

        Ok(Self {
            scanner,
            connection_manager,
            notification_handler,
        })
    }
}

impl CentralController for BluetoothManager {
    fn start_scan(&mut self, generation: Generation) {
        self.scanner.start_scan(generation);
    }

    fn stop_scan(&mut self) {
        self.scanner.stop_scan();
    }

    fn connect(&mut self, generation: Generation, peripheral: &PeripheralHandle) {
        self.connection_manager.connect(generation, peripheral);
    }

    fn disconnect(&mut self) {
        self.notification_handler.stop_notifications();
        self.connection_manager.disconnect();
    }

    fn discover_services(&mut self, generation: Generation, _peripheral: &PeripheralHandle) {
        self.connection_manager.discover_services(generation);
    }

    fn discover_characteristics(&mut self, generation: Generation, service: &ServiceHandle) {
        self.connection_manager.discover_characteristics(generation, *service);
    }

    fn read_characteristic(&mut self, generation: Generation, characteristic: &CharacteristicHandle) {
        self.connection_manager.read_characteristic(generation, *characteristic);
    }

    fn subscribe(&mut self, generation: Generation, characteristic: &CharacteristicHandle) {
        self.notification_handler.setup_notifications(generation, *characteristic);
    }

    fn take_pending(&mut self) -> Vec<JoinHandle<()>> {
        self.connection_manager.take_pending_disconnects()
    }
}
