//! Shared fakes for the session integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use glucowatch_bridge_lib::core::bluetooth::{
    Advertisement, CentralController, CentralEvent, CharacteristicHandle, CharacteristicRole,
    Generation, PeripheralHandle, SessionEvent, ServiceHandle, SENSOR_NAME, UUID_DEVICE_INFORMATION_SERVICE,
    UUID_GLUCOSE_SERVICE,
};
use glucowatch_bridge_lib::core::codec::fixtures;
use glucowatch_bridge_lib::core::{
    ConnectionState, ErrorDetail, ErrorKind, GlucoseReading, SessionObserver, SessionOptions,
    SessionStateMachine,
};

/// A radio request issued by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    StartScan(Generation),
    StopScan,
    Connect(Generation, String),
    Disconnect,
    DiscoverServices(Generation),
    DiscoverCharacteristics(Generation, ServiceHandle),
    Read(Generation, CharacteristicRole),
    Subscribe(Generation, CharacteristicRole),
}

/// Records every request instead of touching a radio
#[derive(Debug, Default)]
pub struct FakeCentral {
    pub requests: Vec<Request>,
    /// When set, `disconnect` runs on a tokio task taking this long
    pub disconnect_latency: Option<Duration>,
    /// Set once a delayed disconnect has finished
    pub disconnect_completed: Arc<AtomicBool>,
    pending: Vec<JoinHandle<()>>,
}

impl FakeCentral {
    pub fn with_disconnect_latency(latency: Duration) -> Self {
        Self {
            disconnect_latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn disconnect_finished(&self) -> bool {
        self.disconnect_completed.load(Ordering::SeqCst)
    }

    pub fn count(&self, matcher: impl Fn(&Request) -> bool) -> usize {
        self.requests.iter().filter(|r| matcher(r)).count()
    }
}

impl CentralController for FakeCentral {
    fn start_scan(&mut self, generation: Generation) {
        self.requests.push(Request::StartScan(generation));
    }

    fn stop_scan(&mut self) {
        self.requests.push(Request::StopScan);
    }

    fn connect(&mut self, generation: Generation, peripheral: &PeripheralHandle) {
        self.requests.push(Request::Connect(generation, peripheral.id.clone()));
    }

    fn disconnect(&mut self) {
        self.requests.push(Request::Disconnect);
        if let Some(latency) = self.disconnect_latency {
            let completed = self.disconnect_completed.clone();
            self.pending.push(tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                completed.store(true, Ordering::SeqCst);
            }));
        }
    }

    fn discover_services(&mut self, generation: Generation, _peripheral: &PeripheralHandle) {
        self.requests.push(Request::DiscoverServices(generation));
    }

    fn discover_characteristics(&mut self, generation: Generation, service: &ServiceHandle) {
        self.requests.push(Request::DiscoverCharacteristics(generation, *service));
    }

    fn read_characteristic(&mut self, generation: Generation, characteristic: &CharacteristicHandle) {
        self.requests.push(Request::Read(generation, characteristic.role));
    }

    fn subscribe(&mut self, generation: Generation, characteristic: &CharacteristicHandle) {
        self.requests.push(Request::Subscribe(generation, characteristic.role));
    }

    fn take_pending(&mut self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut self.pending)
    }
}

/// A notification received by the observer
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    State(ConnectionState),
    Manufacturer(String),
    Glucose(u16),
    Error(ErrorKind, ErrorDetail),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub notices: Vec<Notice>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<ConnectionState> {
        self.notices
            .iter()
            .filter_map(|n| match n {
                Notice::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorKind> {
        self.notices
            .iter()
            .filter_map(|n| match n {
                Notice::Error(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn readings(&self) -> Vec<u16> {
        self.notices
            .iter()
            .filter_map(|n| match n {
                Notice::Glucose(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_connection_state_changed(&mut self, state: &ConnectionState) {
        self.notices.push(Notice::State(*state));
    }

    fn on_manufacturer_name_updated(&mut self, name: &str) {
        self.notices.push(Notice::Manufacturer(name.to_string()));
    }

    fn on_glucose_reading_updated(&mut self, reading: &GlucoseReading) {
        self.notices.push(Notice::Glucose(reading.value));
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &ErrorDetail) {
        self.notices.push(Notice::Error(kind, detail.clone()));
    }
}

pub type Machine = SessionStateMachine<FakeCentral, RecordingObserver>;

pub fn machine() -> Machine {
    machine_with(SessionOptions::default())
}

pub fn machine_with(options: SessionOptions) -> Machine {
    machine_on(FakeCentral::default(), options)
}

pub fn machine_on(central: FakeCentral, options: SessionOptions) -> Machine {
    SessionStateMachine::new(central, RecordingObserver::default(), options)
}

pub const DEVICE_INFO_SERVICE: ServiceHandle = ServiceHandle {
    key: 1,
    uuid: UUID_DEVICE_INFORMATION_SERVICE,
};

pub const GLUCOSE_SERVICE: ServiceHandle = ServiceHandle {
    key: 2,
    uuid: UUID_GLUCOSE_SERVICE,
};

pub const MANUFACTURER: CharacteristicHandle = CharacteristicHandle {
    key: 3,
    role: CharacteristicRole::ManufacturerName,
    service: UUID_DEVICE_INFORMATION_SERVICE,
};

pub const GLUCOSE: CharacteristicHandle = CharacteristicHandle {
    key: 4,
    role: CharacteristicRole::GlucoseMeasurement,
    service: UUID_GLUCOSE_SERVICE,
};

pub fn sensor_advertisement() -> Advertisement {
    Advertisement {
        peripheral: PeripheralHandle::new("AA:BB:CC:DD:EE:FF", Some(SENSOR_NAME.to_string())),
        local_name: Some(SENSOR_NAME.to_string()),
        services: vec![UUID_GLUCOSE_SERVICE],
        rssi: Some(-60),
    }
}

pub fn other_advertisement() -> Advertisement {
    Advertisement {
        peripheral: PeripheralHandle::new("11:22:33:44:55:66", Some("Headphones".to_string())),
        local_name: Some("Headphones".to_string()),
        services: Vec::new(),
        rssi: Some(-40),
    }
}

/// Delivers an event stamped with the machine's current generation
pub fn deliver(machine: &mut Machine, event: CentralEvent) {
    let generation = machine.generation();
    machine.handle(SessionEvent::new(generation, event));
}

pub fn manufacturer_value(name: &str) -> CentralEvent {
    CentralEvent::CharacteristicValueUpdated {
        characteristic: MANUFACTURER,
        value: fixtures::encode_manufacturer_name(name),
    }
}

pub fn glucose_value(value: u16) -> CentralEvent {
    CentralEvent::CharacteristicValueUpdated {
        characteristic: GLUCOSE,
        value: fixtures::encode_glucose(value),
    }
}

/// Drives a fresh machine up to ReadingCharacteristics
pub fn reading_machine(options: SessionOptions) -> Machine {
    reading_machine_on(FakeCentral::default(), options)
}

pub fn reading_machine_on(central: FakeCentral, options: SessionOptions) -> Machine {
    let mut machine = machine_on(central, options);
    machine.start_scan();
    deliver(&mut machine, CentralEvent::DeviceDiscovered(sensor_advertisement()));
    deliver(&mut machine, CentralEvent::ConnectionEstablished);
    deliver(
        &mut machine,
        CentralEvent::ServicesDiscovered(vec![DEVICE_INFO_SERVICE, GLUCOSE_SERVICE]),
    );
    deliver(
        &mut machine,
        CentralEvent::CharacteristicsDiscovered {
            service: DEVICE_INFO_SERVICE,
            characteristics: vec![MANUFACTURER],
        },
    );
    deliver(
        &mut machine,
        CentralEvent::CharacteristicsDiscovered {
            service: GLUCOSE_SERVICE,
            characteristics: vec![GLUCOSE],
        },
    );
    assert_eq!(machine.connection_state(), ConnectionState::ReadingCharacteristics);
    machine
}
