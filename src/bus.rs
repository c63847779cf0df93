//! Group-address bus.
//!
//! [`KnxBus`] keeps one [`GroupAddressBus`] per group address that has at
//! least one member. Attaching mirrors the address into the device's own
//! binding list and detaching removes it from both sides; an address whose
//! last member leaves is dropped.

use crate::address::{GroupAddress, GroupAddressStyle};
use crate::device::{Device, DeviceId, DeviceStore};
use crate::error::{ConfigError, DeviceFault};
use crate::telegram::Telegram;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Members bound to one group address, in attachment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAddressBus {
    address: GroupAddress,
    members: Vec<DeviceId>,
}

impl GroupAddressBus {
    fn new(address: GroupAddress) -> Self {
        Self {
            address,
            members: Vec::new(),
        }
    }

    pub fn address(&self) -> GroupAddress {
        self.address
    }

    pub fn members(&self) -> &[DeviceId] {
        &self.members
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached,
    AlreadyAttached,
}

/// Result of fanning one telegram out to the actuators of its address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// No group address bus exists for the destination.
    pub unrouted: bool,
    /// Actuators whose `update_state` returned without fault.
    pub delivered: Vec<DeviceId>,
    /// Actuators whose update faulted. Siblings still received the telegram.
    pub faults: Vec<(DeviceId, DeviceFault)>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BusInfo {
    pub style: GroupAddressStyle,
    pub group_addresses: Vec<GroupAddressInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupAddressInfo {
    pub address: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KnxBus {
    style: GroupAddressStyle,
    buses: BTreeMap<GroupAddress, GroupAddressBus>,
}

impl KnxBus {
    pub fn new(style: GroupAddressStyle) -> Self {
        Self {
            style,
            buses: BTreeMap::new(),
        }
    }

    pub fn style(&self) -> GroupAddressStyle {
        self.style
    }

    pub fn group_addresses(&self) -> impl Iterator<Item = GroupAddress> + '_ {
        self.buses.keys().copied()
    }

    pub fn bus(&self, address: GroupAddress) -> Option<&GroupAddressBus> {
        self.buses.get(&address)
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Bind device `id` to `address`. Attaching twice is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownDevice` if `id` is not in `devices`,
    /// `ConfigError::StyleMismatch` if the address does not use this bus's
    /// style, or `ConfigError::TooManyBindings` if the device is full.
    pub fn attach(
        &mut self,
        id: DeviceId,
        devices: &mut DeviceStore,
        address: GroupAddress,
    ) -> Result<AttachOutcome, ConfigError> {
        let device = devices
            .get_mut(id)
            .ok_or_else(|| ConfigError::UnknownDevice(format!("#{}", id.index())))?;
        if address.style() != self.style {
            return Err(ConfigError::StyleMismatch {
                address: address.to_string(),
                expected: self.style.name(),
            });
        }

        let already = self.buses.get(&address).is_some_and(|bus| bus.contains(id));
        if already {
            warn!(device = device.name(), %address, "device already attached to group address");
            return Ok(AttachOutcome::AlreadyAttached);
        }

        device.bind(address)?;
        self.buses
            .entry(address)
            .or_insert_with(|| GroupAddressBus::new(address))
            .members
            .push(id);
        debug!(device = device.name(), %address, "attached");
        Ok(AttachOutcome::Attached)
    }

    /// Unbind device `id` from `address`. Returns `false` (and logs) when no
    /// such binding exists.
    pub fn detach(&mut self, id: DeviceId, devices: &mut DeviceStore, address: GroupAddress) -> bool {
        let Some(device) = devices.get_mut(id) else {
            warn!(id = id.index(), %address, "detach: unknown device");
            return false;
        };
        Self::unlink(&mut self.buses, id, device, address)
    }

    fn unlink(
        buses: &mut BTreeMap<GroupAddress, GroupAddressBus>,
        id: DeviceId,
        device: &mut Device,
        address: GroupAddress,
    ) -> bool {
        let Some(bus) = buses.get_mut(&address) else {
            warn!(device = device.name(), %address, "detach: no bus for group address");
            return false;
        };
        let Some(index) = bus.members.iter().position(|m| *m == id) else {
            warn!(device = device.name(), %address, "detach: device not attached");
            return false;
        };

        bus.members.remove(index);
        device.unbind(address);
        if bus.is_empty() {
            buses.remove(&address);
            debug!(%address, "group address bus emptied and removed");
        }
        debug!(device = device.name(), %address, "detached");
        true
    }

    /// Detach device `id` from every address it is bound to.
    pub fn detach_all(&mut self, id: DeviceId, devices: &mut DeviceStore) {
        let Some(device) = devices.get_mut(id) else {
            return;
        };
        let addresses: Vec<GroupAddress> = device.group_addresses().to_vec();
        for address in addresses {
            Self::unlink(&mut self.buses, id, device, address);
        }
    }

    /// Deliver `telegram` to every actuator attached to its destination.
    ///
    /// A fault in one actuator is logged and recorded in the report; the
    /// remaining actuators are still updated.
    pub fn transmit(&self, telegram: &Telegram, devices: &mut DeviceStore) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(bus) = self.buses.get(&telegram.destination()) else {
            debug!(destination = %telegram.destination(), "no listener, telegram dropped");
            report.unrouted = true;
            return report;
        };

        for &id in &bus.members {
            let Some(device) = devices.get_mut(id) else {
                continue;
            };
            if !device.is_actuator() {
                continue;
            }
            match device.update_state(telegram) {
                Ok(changed) => {
                    debug!(device = device.name(), changed, "telegram applied");
                    report.delivered.push(id);
                }
                Err(fault) => {
                    warn!(source = %telegram.source(), %fault, "actuator update failed");
                    report.faults.push((id, fault));
                }
            }
        }
        report
    }

    pub fn info(&self, devices: &DeviceStore) -> BusInfo {
        BusInfo {
            style: self.style,
            group_addresses: self
                .buses
                .values()
                .map(|bus| GroupAddressInfo {
                    address: bus.address.to_string(),
                    members: bus
                        .members
                        .iter()
                        .filter_map(|id| devices.get(*id))
                        .map(|d| d.name().to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::IndividualAddress;
    use crate::device::{ActuatorKind, ModuleKind};
    use crate::telegram::Payload;

    fn setup() -> (KnxBus, DeviceStore, DeviceId, GroupAddress) {
        let mut store = DeviceStore::new();
        let led = Device::actuator(
            "led",
            IndividualAddress::new(1, 1, 1).unwrap(),
            ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 },
        )
        .unwrap();
        let id = store.insert(led);
        let address = GroupAddress::three_level(1, 1, 1).unwrap();
        (KnxBus::new(GroupAddressStyle::ThreeLevel), store, id, address)
    }

    #[test]
    fn test_attach_rejects_foreign_style() {
        let (mut bus, mut store, id, _) = setup();
        let free = GroupAddress::free(10).unwrap();
        let result = bus.attach(id, &mut store, free);
        assert!(matches!(result, Err(ConfigError::StyleMismatch { .. })));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_attach_unknown_id_leaves_bus_untouched() {
        let (mut bus, mut store, id, address) = setup();
        store.remove(id);
        let result = bus.attach(id, &mut store, address);
        assert!(matches!(result, Err(ConfigError::UnknownDevice(_))));
        assert!(bus.is_empty());
        assert!(!bus.detach(id, &mut store, address));
    }

    #[test]
    fn test_detach_unknown_binding_is_noop() {
        let (mut bus, mut store, id, address) = setup();
        assert!(!bus.detach(id, &mut store, address));
    }

    #[test]
    fn test_transmit_skips_non_actuators() {
        let (mut bus, mut store, led, address) = setup();
        let button = store.insert(
            Device::functional_module("button", IndividualAddress::new(1, 1, 2).unwrap(), ModuleKind::Button)
                .unwrap(),
        );
        bus.attach(led, &mut store, address).unwrap();
        bus.attach(button, &mut store, address).unwrap();

        let telegram = Telegram::write(IndividualAddress::new(1, 1, 2).unwrap(), address, Payload::Binary(true));
        let report = bus.transmit(&telegram, &mut store);
        assert_eq!(report.delivered, vec![led]);
        assert!(report.faults.is_empty());
    }

    #[test]
    fn test_unrouted_telegram_dropped() {
        let (bus, mut store, _, address) = setup();
        let telegram = Telegram::write(IndividualAddress::new(1, 1, 9).unwrap(), address, Payload::Binary(true));
        let report = bus.transmit(&telegram, &mut store);
        assert!(report.unrouted);
        assert_eq!(report.delivered_count(), 0);
    }
}
