//! Bluetooth connection handling for the GlucoWatch
//! This module connects to the sensor, negotiates its GATT topology and
//! reads characteristics. Every request runs on its own task and reports
//! back through the session event queue.

use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Device};
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::central::{CentralEvent, EventSender, Generation, emit};
use crate::core::bluetooth::registry::{SharedRegistry, lock};
use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralHandle, ServiceHandle};

/// How often an established link is checked for loss
const LINK_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Connection manager for the sensor
pub struct ConnectionManager {
    adapter: Adapter,
    registry: SharedRegistry,
    events: EventSender,
    connect_timeout: Duration,
    /// Cancels the link watcher when the disconnect is ours
    link_token: CancellationToken,
    /// Disconnects not yet confirmed by the adapter
    pending_disconnects: Vec<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter, registry: SharedRegistry, events: EventSender, connect_timeout: Duration) -> Self {
        Self {
            adapter,
            registry,
            events,
            connect_timeout,
            link_token: CancellationToken::new(),
            pending_disconnects: Vec::new(),
        }
    }

    /// Connects to a previously discovered peripheral, bounded by the connect timeout
    pub fn connect(&mut self, generation: Generation, peripheral: &PeripheralHandle) {
        self.link_token = CancellationToken::new();
        let adapter = self.adapter.clone();
        let registry = self.registry.clone();
        let events = self.events.clone();
        let link_token = self.link_token.clone();
        let connect_timeout = self.connect_timeout;
        let id = peripheral.id.clone();

        tokio::spawn(async move {
            let device = lock(&registry).device(&id);
            let Some(device) = device else {
                emit(
                    &events,
                    generation,
                    CentralEvent::ConnectionFailed(format!("Device not found with ID: {}", id)),
                );
                return;
            };

            let attempt = tokio::select! {
                _ = link_token.cancelled() => {
                    debug!("Connection attempt to {} abandoned", id);
                    return;
                }
                attempt = tokio::time::timeout(connect_timeout, Self::try_connect(&adapter, &device)) => attempt,
            };

            match attempt {
                Ok(Ok(())) if link_token.is_cancelled() => {
                    debug!("Connection to {} no longer wanted", id);
                    if let Err(e) = adapter.disconnect_device(&device).await {
                        warn!("Failed to disconnect from {}: {}", id, e);
                    }
                }
                Ok(Ok(())) => {
                    info!("Connection to {} successful", id);
                    lock(&registry).set_active(device.clone());
                    emit(&events, generation, CentralEvent::ConnectionEstablished);
                    Self::watch_link(device, events, link_token, generation).await;
                }
                Ok(Err(e)) => {
                    warn!("Connection attempt to {} failed: {}", id, e);
                    emit(&events, generation, CentralEvent::ConnectionFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Connection attempt to {} timed out", id);
                    emit(
                        &events,
                        generation,
                        CentralEvent::ConnectionFailed(format!(
                            "Connection timed out after {} s",
                            connect_timeout.as_secs()
                        )),
                    );
                }
            }
        });
    }

    async fn try_connect(adapter: &Adapter, device: &Device) -> Result<()> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", device.id(), name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            adapter.connect_device(device).await?;
        }
        Ok(())
    }

    /// Polls the link until it drops or the disconnect is requested locally
    async fn watch_link(device: Device, events: EventSender, link_token: CancellationToken, generation: Generation) {
        let mut interval = tokio::time::interval(LINK_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = link_token.cancelled() => {
                    debug!("Link watcher for {} stopped", device.id());
                    return;
                }
                _ = interval.tick() => {
                    if !device.is_connected().await {
                        warn!("Device {} lost connection", device.id());
                        emit(
                            &events,
                            generation,
                            CentralEvent::PeripheralDisconnected("Peripheral dropped the link".to_string()),
                        );
                        return;
                    }
                }
            }
        }
    }

    pub fn discover_services(&self, generation: Generation) {
        let registry = self.registry.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let device = lock(&registry).active();
            let Some(device) = device else {
                emit(&events, generation, CentralEvent::DiscoveryFailed("No device connected".to_string()));
                return;
            };

            info!("Discovering services...");
            match device.discover_services().await {
                Ok(services) => {
                    let handles = {
                        let mut registry = lock(&registry);
                        services
                            .into_iter()
                            .map(|service| registry.register_service(service))
                            .collect::<Vec<_>>()
                    };
                    for handle in &handles {
                        debug!("Available service: {}", handle.uuid);
                    }
                    emit(&events, generation, CentralEvent::ServicesDiscovered(handles));
                }
                Err(e) => {
                    warn!("Service discovery failed: {}", e);
                    emit(&events, generation, CentralEvent::DiscoveryFailed(e.to_string()));
                }
            }
        });
    }

    pub fn discover_characteristics(&self, generation: Generation, service: ServiceHandle) {
        let registry = self.registry.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let platform_service = lock(&registry).service(service.key);
            let Some(platform_service) = platform_service else {
                emit(
                    &events,
                    generation,
                    CentralEvent::DiscoveryFailed(format!("Service {} is no longer available", service.uuid)),
                );
                return;
            };

            match platform_service.discover_characteristics().await {
                Ok(characteristics) => {
                    let handles = {
                        let mut registry = lock(&registry);
                        characteristics
                            .into_iter()
                            .filter_map(|c| registry.register_characteristic(service.uuid, c))
                            .collect::<Vec<_>>()
                    };
                    for handle in &handles {
                        info!("Found {:?} characteristic in service {}", handle.role, service.uuid);
                    }
                    emit(
                        &events,
                        generation,
                        CentralEvent::CharacteristicsDiscovered {
                            service,
                            characteristics: handles,
                        },
                    );
                }
                Err(e) => {
                    warn!("Characteristic discovery for {} failed: {}", service.uuid, e);
                    emit(&events, generation, CentralEvent::DiscoveryFailed(e.to_string()));
                }
            }
        });
    }

    pub fn read_characteristic(&self, generation: Generation, characteristic: CharacteristicHandle) {
        let registry = self.registry.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let platform_characteristic = lock(&registry).characteristic(characteristic.key);
            let Some(platform_characteristic) = platform_characteristic else {
                emit(
                    &events,
                    generation,
                    CentralEvent::CharacteristicReadError {
                        characteristic,
                        detail: "Characteristic is no longer available".to_string(),
                    },
                );
                return;
            };

            let event = match platform_characteristic.read().await {
                Ok(value) => {
                    debug!("Read {:?}: {:02X?}", characteristic.role, value);
                    CentralEvent::CharacteristicValueUpdated { characteristic, value }
                }
                Err(e) => CentralEvent::CharacteristicReadError {
                    characteristic,
                    detail: e.to_string(),
                },
            };
            emit(&events, generation, event);
        });
    }

    /// Disconnect from the sensor and release every GATT object
    pub fn disconnect(&mut self) {
        self.link_token.cancel();
        let device = lock(&self.registry).take_active();
        let Some(device) = device else {
            debug!("No device connected");
            return;
        };

        let adapter = self.adapter.clone();
        self.pending_disconnects.retain(|handle| !handle.is_finished());
        self.pending_disconnects.push(tokio::spawn(async move {
            if device.is_connected().await {
                info!("Disconnecting from device {}", device.id());
                match adapter.disconnect_device(&device).await {
                    Ok(()) => info!("Successfully disconnected"),
                    Err(e) => warn!("Failed to disconnect from {}: {}", device.id(), e),
                }
            } else {
                info!("Device {} not connected", device.id());
            }
        }));
    }

    pub fn take_pending_disconnects(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.pending_disconnects)
    }
}
