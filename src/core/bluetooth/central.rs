//! Central controller contract
//! The session state machine drives the radio exclusively through
//! [`CentralController`] and learns about outcomes through [`SessionEvent`]s.

use std::fmt;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::bluetooth::types::{
    Advertisement, CharacteristicHandle, PeripheralHandle, ServiceHandle,
};

/// Session generation token. Events stamped with an older generation are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Asynchronous outcome of a radio request, or an unsolicited radio event
#[derive(Debug, Clone)]
pub enum CentralEvent {
    DeviceDiscovered(Advertisement),
    ScanTimeout,
    ConnectionEstablished,
    ConnectionFailed(String),
    ServicesDiscovered(Vec<ServiceHandle>),
    /// Service or characteristic discovery could not be performed at all
    DiscoveryFailed(String),
    CharacteristicsDiscovered {
        service: ServiceHandle,
        characteristics: Vec<CharacteristicHandle>,
    },
    CharacteristicValueUpdated {
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
    },
    CharacteristicReadError {
        characteristic: CharacteristicHandle,
        detail: String,
    },
    PeripheralDisconnected(String),
}

/// A [`CentralEvent`] stamped with the generation of the request that caused it
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub generation: Generation,
    pub event: CentralEvent,
}

impl SessionEvent {
    pub fn new(generation: Generation, event: CentralEvent) -> Self {
        Self { generation, event }
    }
}

/// Queue onto which radio outcomes are posted, drained by the session runner
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Posts an event, tolerating a session that has already gone away.
pub fn emit(events: &EventSender, generation: Generation, event: CentralEvent) {
    if let Err(e) = events.send(SessionEvent::new(generation, event)) {
        debug!("Dropping event, session receiver closed: {:?}", e.0.event);
    }
}

/// Platform radio primitives.
///
/// Every request is fire-and-forget: results surface later as
/// [`SessionEvent`]s stamped with the given generation.
pub trait CentralController {
    fn start_scan(&mut self, generation: Generation);
    fn stop_scan(&mut self);
    fn connect(&mut self, generation: Generation, peripheral: &PeripheralHandle);
    fn disconnect(&mut self);
    fn discover_services(&mut self, generation: Generation, peripheral: &PeripheralHandle);
    fn discover_characteristics(&mut self, generation: Generation, service: &ServiceHandle);
    fn read_characteristic(&mut self, generation: Generation, characteristic: &CharacteristicHandle);
    fn subscribe(&mut self, generation: Generation, characteristic: &CharacteristicHandle);

    /// Hands over radio work still in flight, such as a disconnect issued by
    /// a teardown. The caller awaits it before the runtime goes away.
    fn take_pending(&mut self) -> Vec<JoinHandle<()>> {
        Vec::new()
    }
}
