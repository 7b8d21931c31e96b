use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::central::{CentralEvent, EventSender, Generation, emit};
use crate::core::bluetooth::device::extract_mac_address;
use crate::core::bluetooth::registry::{SharedRegistry, lock};
use crate::core::bluetooth::types::{Advertisement, PeripheralHandle};

/// Reports every advertisement seen until cancelled or the scan times out.
/// Filtering is left to the session.
pub struct BluetoothScanner {
    adapter: Adapter,
    registry: SharedRegistry,
    events: EventSender,
    scan_timeout: Duration,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, registry: SharedRegistry, events: EventSender, scan_timeout: Duration) -> Self {
        Self {
            adapter,
            registry,
            events,
            scan_timeout,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    pub fn start_scan(&mut self, generation: Generation) {
        if self.scan_task_handle.is_some() {
            self.stop_scan();
        }
        lock(&self.registry).clear_devices();

        self.cancel_token = CancellationToken::new();
        let handle = tokio::spawn(Self::internal_scan_task(
            self.adapter.clone(),
            self.registry.clone(),
            self.events.clone(),
            self.cancel_token.clone(),
            Instant::now() + self.scan_timeout,
            generation,
        ));
        self.scan_task_handle = Some(handle);
        info!("Device scan task started ({:?} timeout).", self.scan_timeout);
    }

    pub fn stop_scan(&mut self) {
        self.cancel_token.cancel();
        if self.scan_task_handle.take().is_some() {
            info!("Stopping Bluetooth scan.");
        } else {
            debug!("No active scan task to stop.");
        }
    }

    async fn internal_scan_task(
        adapter: Adapter,
        registry: SharedRegistry,
        events: EventSender,
        cancel_token: CancellationToken,
        deadline: Instant,
        generation: Generation,
    ) {
        tokio::select! {
            result = Self::discover(&adapter, &registry, &events, generation) => {
                match result {
                    Ok(()) => info!("Bluetooth scan stream has ended."),
                    Err(e) => error!("Bluetooth scan failed: {}", e),
                }
            }
            _ = sleep_until(deadline) => {
                info!("Scan timed out.");
                emit(&events, generation, CentralEvent::ScanTimeout);
                return;
            }
            _ = cancel_token.cancelled() => {
                debug!("Scan task cancelled.");
                return;
            }
        }

        // Nothing more will be discovered; the session still learns about it
        // through the timeout.
        tokio::select! {
            _ = sleep_until(deadline) => emit(&events, generation, CentralEvent::ScanTimeout),
            _ = cancel_token.cancelled() => debug!("Scan task cancelled."),
        }
    }

    async fn discover(
        adapter: &Adapter,
        registry: &SharedRegistry,
        events: &EventSender,
        generation: Generation,
    ) -> Result<()> {
        // find connected devices first
        info!("Checking for connected devices");
        for device in adapter.connected_devices().await? {
            let name = device.name().ok();
            Self::report(registry, events, generation, device, name, Vec::new(), None);
        }

        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&[]).await?;
        while let Some(discovered) = scan_stream.next().await {
            debug!("Found device - Device: {:?}, RSSI: {:?}", discovered.device, discovered.rssi);
            Self::report(
                registry,
                events,
                generation,
                discovered.device,
                discovered.adv_data.local_name,
                discovered.adv_data.services,
                discovered.rssi,
            );
        }
        Ok(())
    }

    fn report(
        registry: &SharedRegistry,
        events: &EventSender,
        generation: Generation,
        device: Device,
        local_name: Option<String>,
        services: Vec<uuid::Uuid>,
        rssi: Option<i16>,
    ) {
        let id = device.id().to_string();
        let name = device.name().ok();
        debug!(
            "Advertisement from {} ({})",
            id,
            extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string())
        );
        lock(registry).remember_device(id.clone(), device);

        let advertisement = Advertisement {
            peripheral: PeripheralHandle::new(id, name),
            local_name,
            services,
            rssi,
        };
        emit(events, generation, CentralEvent::DeviceDiscovered(advertisement));
    }
}
