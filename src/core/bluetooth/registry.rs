//! Platform handles behind the opaque session handles
//! The session state machine only ever sees keys; this registry maps them
//! back to bluest objects for the duration of a scan or connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bluest::{Characteristic, Device, Service};
use uuid::Uuid;

use crate::core::bluetooth::types::{CharacteristicHandle, CharacteristicRole, ServiceHandle};

pub type SharedRegistry = Arc<Mutex<GattRegistry>>;

#[derive(Default)]
pub struct GattRegistry {
    /// Devices seen during the current scan, by platform id
    devices: HashMap<String, Device>,
    /// The connected device
    active: Option<Device>,
    services: HashMap<u32, Service>,
    characteristics: HashMap<u32, Characteristic>,
    next_key: u32,
}

impl GattRegistry {
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::default()))
    }

    pub fn remember_device(&mut self, id: String, device: Device) {
        self.devices.insert(id, device);
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.get(id).cloned()
    }

    pub fn clear_devices(&mut self) {
        self.devices.clear();
    }

    pub fn set_active(&mut self, device: Device) {
        self.active = Some(device);
    }

    pub fn active(&self) -> Option<Device> {
        self.active.clone()
    }

    /// Releases the connected device and every GATT object obtained from it.
    pub fn take_active(&mut self) -> Option<Device> {
        self.services.clear();
        self.characteristics.clear();
        self.active.take()
    }

    pub fn register_service(&mut self, service: Service) -> ServiceHandle {
        let key = self.allocate_key();
        let handle = ServiceHandle { key, uuid: service.uuid() };
        self.services.insert(key, service);
        handle
    }

    pub fn service(&self, key: u32) -> Option<Service> {
        self.services.get(&key).cloned()
    }

    /// Registers a characteristic if it plays a role in the session.
    pub fn register_characteristic(
        &mut self,
        service: Uuid,
        characteristic: Characteristic,
    ) -> Option<CharacteristicHandle> {
        let role = CharacteristicRole::from_uuid(characteristic.uuid())?;
        let key = self.allocate_key();
        self.characteristics.insert(key, characteristic);
        Some(CharacteristicHandle { key, role, service })
    }

    pub fn characteristic(&self, key: u32) -> Option<Characteristic> {
        self.characteristics.get(&key).cloned()
    }

    fn allocate_key(&mut self) -> u32 {
        self.next_key = self.next_key.wrapping_add(1);
        self.next_key
    }
}

/// Locks the registry, recovering the guard from a poisoned lock.
pub fn lock(registry: &SharedRegistry) -> MutexGuard<'_, GattRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
