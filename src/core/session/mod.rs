//! Acquisition session state machine
//! This module owns the lifecycle of one acquisition session against one
//! GlucoWatch peripheral: scan, connect, GATT discovery, characteristic
//! reads and teardown. Radio events are consumed one at a time.

pub mod observer;
pub mod runner;
pub mod state;

use std::collections::HashMap;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::session_config::SessionConfig;
use crate::core::bluetooth::central::{CentralController, CentralEvent, Generation, SessionEvent};
use crate::core::bluetooth::device::DeviceFilter;
use crate::core::bluetooth::types::{
    Advertisement, CharacteristicHandle, CharacteristicRole, PeripheralHandle, ServiceHandle,
};
use crate::core::codec::{self, GlucoseReading};
use crate::core::error::{CodecError, ErrorDetail, ErrorKind};

use observer::SessionObserver;
use state::{ConnectionState, DeviceInfo, FailureReason};

/// Tunables of a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub filter: DeviceFilter,
    /// Services the peripheral must expose
    pub required_services: Vec<Uuid>,
    /// Subscribe to glucose notifications once both characteristics are known
    pub subscribe_to_glucose: bool,
}

impl SessionOptions {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            filter: DeviceFilter::from_config(config),
            required_services: vec![
                config.device_information_service_uuid,
                config.glucose_service_uuid,
            ],
            subscribe_to_glucose: config.subscribe_to_glucose,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

pub struct SessionStateMachine<C: CentralController, O: SessionObserver> {
    central: C,
    observer: O,
    options: SessionOptions,
    state: ConnectionState,
    generation: Generation,
    device_info: DeviceInfo,
    /// The single active peripheral, set from Connecting onward
    peripheral: Option<PeripheralHandle>,
    /// Services whose characteristic discovery is still outstanding
    pending_services: Vec<ServiceHandle>,
    discovered: Vec<CharacteristicHandle>,
    characteristics: HashMap<CharacteristicRole, CharacteristicHandle>,
    manufacturer_read: bool,
    glucose_read: bool,
    /// Glucose reading decoded before the manufacturer name arrived
    held_reading: Option<GlucoseReading>,
    latest_reading: Option<GlucoseReading>,
}

impl<C: CentralController, O: SessionObserver> SessionStateMachine<C, O> {
    pub fn new(central: C, observer: O, options: SessionOptions) -> Self {
        Self {
            central,
            observer,
            options,
            state: ConnectionState::Idle,
            generation: Generation::default(),
            device_info: DeviceInfo::default(),
            peripheral: None,
            pending_services: Vec::new(),
            discovered: Vec::new(),
            characteristics: HashMap::new(),
            manufacturer_read: false,
            glucose_read: false,
            held_reading: None,
            latest_reading: None,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn latest_reading(&self) -> Option<&GlucoseReading> {
        self.latest_reading.as_ref()
    }

    pub fn active_peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Characteristic handles currently held, valid only while connected
    pub fn characteristic_handles(&self) -> impl Iterator<Item = &CharacteristicHandle> {
        self.characteristics.values()
    }

    pub fn central(&self) -> &C {
        &self.central
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Starts a new session. A no-op while scanning; rejected while a
    /// connection is outstanding or established.
    pub fn start_scan(&mut self) {
        if self.state == ConnectionState::Scanning {
            debug!("Scan already in progress, ignoring start request");
            return;
        }
        if !self.state.can_start_scan() {
            warn!("Cannot start a scan while {}", self.state);
            return;
        }

        self.generation = self.generation.next();
        self.reset_session();
        info!("Starting scan for GlucoWatch (session {})", self.generation);
        self.set_state(ConnectionState::Scanning);
        self.central.start_scan(self.generation);
    }

    /// Ends the current session. Radio events already in flight become stale.
    pub fn teardown(&mut self) {
        match self.state {
            ConnectionState::Idle => return,
            ConnectionState::Scanning => self.central.stop_scan(),
            state if state.is_busy() => self.central.disconnect(),
            _ => {}
        }

        let was_active = self.state.is_busy() || self.state == ConnectionState::Scanning;
        self.generation = self.generation.next();
        self.invalidate_handles();
        info!("Session torn down, now at generation {}", self.generation);
        if was_active {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Radio work a teardown left in flight.
    pub(crate) fn take_pending(&mut self) -> Vec<JoinHandle<()>> {
        self.central.take_pending()
    }

    /// Processes a batch of events delivered together.
    pub fn handle_batch(&mut self, events: Vec<SessionEvent>) {
        for event in order_batch(events) {
            self.handle(event);
        }
    }

    /// Processes a single event.
    pub fn handle(&mut self, event: SessionEvent) {
        if event.generation != self.generation {
            debug!(
                "Discarding stale event from session {} (current {}): {:?}",
                event.generation, self.generation, event.event
            );
            return;
        }

        match event.event {
            CentralEvent::DeviceDiscovered(advertisement) => self.on_device_discovered(advertisement),
            CentralEvent::ScanTimeout => self.on_scan_timeout(),
            CentralEvent::ConnectionEstablished => self.on_connection_established(),
            CentralEvent::ConnectionFailed(detail) => self.on_connection_failed(detail),
            CentralEvent::ServicesDiscovered(services) => self.on_services_discovered(services),
            CentralEvent::DiscoveryFailed(detail) => self.on_discovery_failed(detail),
            CentralEvent::CharacteristicsDiscovered { service, characteristics } => {
                self.on_characteristics_discovered(service, characteristics)
            }
            CentralEvent::CharacteristicValueUpdated { characteristic, value } => {
                self.on_value_updated(characteristic, &value)
            }
            CentralEvent::CharacteristicReadError { characteristic, detail } => {
                self.on_read_error(characteristic, detail)
            }
            CentralEvent::PeripheralDisconnected(reason) => self.on_peripheral_disconnected(reason),
        }
    }

    fn on_device_discovered(&mut self, advertisement: Advertisement) {
        if self.state != ConnectionState::Scanning {
            debug!("Ignoring discovery of {} outside of scan", advertisement.peripheral.id);
            return;
        }
        if !self.options.filter.matches(&advertisement) {
            debug!(
                "Skipping device {} ({:?})",
                advertisement.peripheral.id, advertisement.local_name
            );
            return;
        }

        info!(
            "Found GlucoWatch: ID: {}, Name: {:?}, RSSI: {:?}",
            advertisement.peripheral.id, advertisement.local_name, advertisement.rssi
        );
        self.central.stop_scan();
        let peripheral = advertisement.peripheral;
        self.set_state(ConnectionState::Connecting);
        self.central.connect(self.generation, &peripheral);
        self.peripheral = Some(peripheral);
    }

    fn on_scan_timeout(&mut self) {
        if self.state != ConnectionState::Scanning {
            return;
        }
        self.central.stop_scan();
        self.fail(
            FailureReason::ScanTimeout,
            ErrorDetail::new("No GlucoWatch sensor found before the scan timed out"),
        );
    }

    fn on_connection_established(&mut self) {
        if self.state != ConnectionState::Connecting {
            debug!("Unexpected connection event while {}", self.state);
            return;
        }
        let Some(peripheral) = self.peripheral.clone() else {
            return;
        };

        info!("Connected to {}, discovering services...", peripheral.id);
        self.set_state(ConnectionState::Connected);
        self.central.discover_services(self.generation, &peripheral);
        self.set_state(ConnectionState::DiscoveringServices);
    }

    fn on_connection_failed(&mut self, detail: String) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.fail(FailureReason::ConnectionFailure, ErrorDetail::new(detail));
    }

    fn on_services_discovered(&mut self, services: Vec<ServiceHandle>) {
        if !matches!(self.state, ConnectionState::Connected | ConnectionState::DiscoveringServices) {
            debug!("Ignoring service discovery result while {}", self.state);
            return;
        }

        let required_uuids = self.options.required_services.clone();
        let mut required = Vec::with_capacity(required_uuids.len());
        for uuid in &required_uuids {
            match services.iter().find(|s| s.uuid == *uuid) {
                Some(service) => required.push(*service),
                None => {
                    for service in &services {
                        debug!("Available service: {}", service.uuid);
                    }
                    self.central.disconnect();
                    self.fail(
                        FailureReason::IncompleteProfile,
                        ErrorDetail::new(format!("Required service not found: {}", uuid))
                            .with_service(*uuid),
                    );
                    return;
                }
            }
        }

        self.set_state(ConnectionState::DiscoveringCharacteristics);
        for service in &required {
            self.central.discover_characteristics(self.generation, service);
        }
        self.pending_services = required;
    }

    fn on_discovery_failed(&mut self, detail: String) {
        if !matches!(
            self.state,
            ConnectionState::Connected
                | ConnectionState::DiscoveringServices
                | ConnectionState::DiscoveringCharacteristics
        ) {
            return;
        }
        self.central.disconnect();
        self.fail(FailureReason::ConnectionFailure, ErrorDetail::new(detail));
    }

    fn on_characteristics_discovered(
        &mut self,
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
    ) {
        if self.state != ConnectionState::DiscoveringCharacteristics {
            debug!("Ignoring characteristic discovery result while {}", self.state);
            return;
        }
        let Some(index) = self.pending_services.iter().position(|s| *s == service) else {
            debug!("Ignoring characteristics of unrequested service {}", service.uuid);
            return;
        };
        self.pending_services.swap_remove(index);
        self.discovered.extend(characteristics);
        if !self.pending_services.is_empty() {
            return;
        }

        let find = |role| self.discovered.iter().find(|c| c.role == role).copied();
        let manufacturer = find(CharacteristicRole::ManufacturerName);
        let glucose = find(CharacteristicRole::GlucoseMeasurement);
        self.discovered.clear();

        let (manufacturer, glucose) = match (manufacturer, glucose) {
            (Some(m), Some(g)) => (m, g),
            (m, _) => {
                let missing = if m.is_none() {
                    CharacteristicRole::ManufacturerName
                } else {
                    CharacteristicRole::GlucoseMeasurement
                };
                self.central.disconnect();
                self.fail(
                    FailureReason::IncompleteProfile,
                    ErrorDetail::new(format!("Required characteristic not found: {}", missing.uuid()))
                        .with_role(missing),
                );
                return;
            }
        };

        self.characteristics.insert(manufacturer.role, manufacturer);
        self.characteristics.insert(glucose.role, glucose);
        self.set_state(ConnectionState::ReadingCharacteristics);
        self.central.read_characteristic(self.generation, &manufacturer);
        self.central.read_characteristic(self.generation, &glucose);
        if self.options.subscribe_to_glucose {
            self.central.subscribe(self.generation, &glucose);
        }
    }

    fn on_value_updated(&mut self, characteristic: CharacteristicHandle, value: &[u8]) {
        if !matches!(self.state, ConnectionState::ReadingCharacteristics | ConnectionState::Ready) {
            debug!("Ignoring value update while {}", self.state);
            return;
        }
        if !self.holds(&characteristic) {
            debug!("Ignoring value update for unknown handle {:?}", characteristic);
            return;
        }

        match characteristic.role {
            CharacteristicRole::ManufacturerName => match codec::decode_manufacturer_name(value) {
                Ok(name) => {
                    self.observer.on_manufacturer_name_updated(&name);
                    self.device_info.manufacturer_name = name;
                    self.manufacturer_read = true;
                    if let Some(reading) = self.held_reading.take() {
                        self.publish_reading(reading);
                    }
                }
                Err(e) => self.report_malformed(&characteristic, &e),
            },
            CharacteristicRole::GlucoseMeasurement => match codec::decode_glucose(value) {
                Ok(reading) => {
                    self.glucose_read = true;
                    if self.manufacturer_read {
                        self.publish_reading(reading);
                    } else {
                        debug!("Holding glucose reading until the manufacturer name is known");
                        self.held_reading = Some(reading);
                    }
                }
                Err(e) => self.report_malformed(&characteristic, &e),
            },
        }

        if self.state == ConnectionState::ReadingCharacteristics
            && self.manufacturer_read
            && self.glucose_read
        {
            info!("GlucoWatch ready");
            self.set_state(ConnectionState::Ready);
        }
    }

    fn on_read_error(&mut self, characteristic: CharacteristicHandle, detail: String) {
        if !matches!(self.state, ConnectionState::ReadingCharacteristics | ConnectionState::Ready)
            || !self.holds(&characteristic)
        {
            return;
        }
        self.report_error(
            ErrorKind::CharacteristicReadError,
            ErrorDetail::new(detail)
                .with_role(characteristic.role)
                .with_service(characteristic.service),
        );
    }

    fn on_peripheral_disconnected(&mut self, reason: String) {
        match self.state {
            ConnectionState::Connecting => {
                self.fail(FailureReason::ConnectionFailure, ErrorDetail::new(reason));
            }
            state if state.is_connected() => {
                warn!("Peripheral disconnected while {}: {}", state, reason);
                self.central.disconnect();
                self.invalidate_handles();
                self.set_state(ConnectionState::Disconnected);
                self.report_error(ErrorKind::UnexpectedDisconnect, ErrorDetail::new(reason));
            }
            _ => debug!("Ignoring disconnect while {}", self.state),
        }
    }

    fn holds(&self, characteristic: &CharacteristicHandle) -> bool {
        self.characteristics.get(&characteristic.role) == Some(characteristic)
    }

    fn publish_reading(&mut self, reading: GlucoseReading) {
        self.observer.on_glucose_reading_updated(&reading);
        self.latest_reading = Some(reading);
    }

    fn report_malformed(&mut self, characteristic: &CharacteristicHandle, error: &CodecError) {
        self.report_error(
            ErrorKind::from(error),
            ErrorDetail::new(error.to_string())
                .with_role(characteristic.role)
                .with_service(characteristic.service),
        );
    }

    fn report_error(&mut self, kind: ErrorKind, detail: ErrorDetail) {
        warn!("{} ({:?}): {}", kind, detail.role, detail.message);
        self.observer.on_error(kind, &detail);
    }

    fn fail(&mut self, reason: FailureReason, detail: ErrorDetail) {
        self.invalidate_handles();
        self.set_state(ConnectionState::Failed(reason));
        self.report_error(reason.into(), detail);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!("Session state {} -> {}", self.state, state);
        self.state = state;
        self.device_info.connection_state = state;
        self.observer.on_connection_state_changed(&state);
    }

    fn invalidate_handles(&mut self) {
        self.peripheral = None;
        self.pending_services.clear();
        self.discovered.clear();
        self.characteristics.clear();
        self.held_reading = None;
    }

    fn reset_session(&mut self) {
        self.invalidate_handles();
        self.manufacturer_read = false;
        self.glucose_read = false;
        self.device_info.manufacturer_name.clear();
    }
}

fn value_update_priority(event: &SessionEvent) -> Option<u8> {
    match &event.event {
        CentralEvent::CharacteristicValueUpdated { characteristic, .. } => {
            Some(characteristic.role.batch_priority())
        }
        _ => None,
    }
}

/// Orders a delivery batch: within each run of consecutive value updates,
/// manufacturer-name updates go before glucose-measurement updates. The
/// sort is stable, everything else keeps its arrival order.
pub(crate) fn order_batch(events: Vec<SessionEvent>) -> Vec<SessionEvent> {
    let mut ordered = Vec::with_capacity(events.len());
    let mut run = Vec::new();

    for event in events {
        if value_update_priority(&event).is_some() {
            run.push(event);
            continue;
        }
        run.sort_by_key(value_update_priority);
        ordered.append(&mut run);
        ordered.push(event);
    }
    run.sort_by_key(value_update_priority);
    ordered.append(&mut run);
    ordered
}
