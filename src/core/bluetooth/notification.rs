//! Notification handling for the GlucoWatch
//! This module subscribes to glucose measurement notifications and forwards
//! every pushed value to the session.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::central::{CentralEvent, EventSender, Generation, emit};
use crate::core::bluetooth::registry::{SharedRegistry, lock};
use crate::core::bluetooth::types::CharacteristicHandle;

/// Notification handler for sensor data
pub struct NotificationHandler {
    registry: SharedRegistry,
    events: EventSender,
    cancel_token: CancellationToken,
}

impl NotificationHandler {
    pub fn new(registry: SharedRegistry, events: EventSender) -> Self {
        Self {
            registry,
            events,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Set up notifications for a characteristic
    pub fn setup_notifications(&self, generation: Generation, characteristic: CharacteristicHandle) {
        let platform_characteristic = lock(&self.registry).characteristic(characteristic.key);
        let Some(platform_characteristic) = platform_characteristic else {
            emit(
                &self.events,
                generation,
                CentralEvent::CharacteristicReadError {
                    characteristic,
                    detail: "Characteristic is no longer available".to_string(),
                },
            );
            return;
        };

        info!("Subscribing to {:?} notifications...", characteristic.role);
        tokio::spawn(Self::process_notifications(
            platform_characteristic,
            characteristic,
            self.events.clone(),
            self.cancel_token.clone(),
            generation,
        ));
    }

    /// Stops every running notification task
    pub fn stop_notifications(&mut self) {
        self.cancel_token.cancel();
        self.cancel_token = CancellationToken::new();
    }

    async fn process_notifications(
        notify_char: Characteristic,
        characteristic: CharacteristicHandle,
        events: EventSender,
        cancel_token: CancellationToken,
        generation: Generation,
    ) {
        let mut notification_stream = match notify_char.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                emit(
                    &events,
                    generation,
                    CentralEvent::CharacteristicReadError {
                        characteristic,
                        detail: format!("Subscription failed: {}", e),
                    },
                );
                return;
            }
        };

        info!("Listening for {:?} notifications...", characteristic.role);
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                result = notification_stream.next() => {
                    match result {
                        Some(Ok(value)) => {
                            debug!("Received {:?} notification: {:02X?}", characteristic.role, value);
                            emit(&events, generation, CentralEvent::CharacteristicValueUpdated { characteristic, value });
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            emit(
                                &events,
                                generation,
                                CentralEvent::CharacteristicReadError { characteristic, detail: e.to_string() },
                            );
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        info!("Notification stream ended");
    }
}
