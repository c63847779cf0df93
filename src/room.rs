//! One simulated room: a bus, a world and the devices placed in it.
//!
//! The room owns the device store and lends it to the bus (telegram fan-out)
//! and to the world (ambient ticks). Configuration collaborators use
//! [`Room::add_device`] and [`Room::attach`]; command collaborators use
//! [`Room::user_input`] and the `get_*_info` accessors; the tick driver calls
//! [`Room::update_world`].

use crate::address::{GroupAddress, GroupAddressStyle};
use crate::ambient::AmbientUpdate;
use crate::bus::{AttachOutcome, BusInfo, DispatchReport, KnxBus};
use crate::device::{ActuatorKind, Device, DeviceId, DeviceInfo, DeviceStore, Location, UserInput};
use crate::error::{CommandError, ConfigError};
use crate::gateway::GatewayBridge;
use crate::geometry::RoomDimensions;
use crate::telegram::Telegram;
use crate::world::{World, WorldInfo, WorldState};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RoomInfo {
    pub name: String,
    pub dimensions: RoomDimensions,
    pub style: GroupAddressStyle,
    pub state: WorldState,
    pub devices: Vec<DeviceInfo>,
}

pub struct Room {
    name: String,
    bus: KnxBus,
    world: World,
    devices: DeviceStore,
    gateway: Option<Box<dyn GatewayBridge>>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("style", &self.bus.style())
            .field("devices", &self.devices.len())
            .field("gateway", &self.gateway.is_some())
            .finish()
    }
}

impl Room {
    /// Build a room around an existing world and bus. The bus style becomes
    /// the room's group address style for its whole lifetime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRoomName` for an empty name.
    pub fn new(name: &str, world: World, bus: KnxBus) -> Result<Self, ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidRoomName(name.to_string()));
        }
        info!(room = name, style = %bus.style(), "room created");
        Ok(Self {
            name: name.to_string(),
            bus,
            world,
            devices: DeviceStore::new(),
            gateway: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn style(&self) -> GroupAddressStyle {
        self.bus.style()
    }

    pub fn bus(&self) -> &KnxBus {
        &self.bus
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn devices(&self) -> &DeviceStore {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.find(name).and_then(|id| self.devices.get(id))
    }

    pub fn set_gateway(&mut self, gateway: Box<dyn GatewayBridge>) {
        self.gateway = Some(gateway);
    }

    fn lookup(&self, name: &str) -> Result<DeviceId, ConfigError> {
        self.devices
            .find(name)
            .ok_or_else(|| ConfigError::UnknownDevice(name.to_string()))
    }

    /// Place `device` at `(x, y, z)` and register it with the ambient
    /// subsystems.
    ///
    /// # Errors
    ///
    /// Rejects duplicate names or individual addresses, locations outside
    /// the room, and windows that are not on a wall.
    pub fn add_device(&mut self, mut device: Device, x: f64, y: f64, z: f64) -> Result<DeviceId, ConfigError> {
        if self.devices.find(device.name()).is_some() {
            return Err(ConfigError::DuplicateName(device.name().to_string()));
        }
        if self.devices.find_by_address(device.address()).is_some() {
            return Err(ConfigError::DuplicateAddress(device.address().to_string()));
        }

        let location = Location::new(x, y, z);
        let dimensions = self.world.dimensions();
        if !dimensions.contains(&location) {
            return Err(ConfigError::OutOfRoom {
                name: device.name().to_string(),
                x,
                y,
                z,
            });
        }
        let is_window = matches!(
            device.as_actuator().map(|a| a.kind()),
            Some(ActuatorKind::Window { .. })
        );
        if is_window && dimensions.wall_of(&location).is_none() {
            return Err(ConfigError::WindowNotOnWall(device.name().to_string()));
        }

        device.set_location(location);
        let id = self.devices.insert(device);
        if let Some(device) = self.devices.get(id) {
            let subsystems = self.world.register(id, device);
            info!(device = device.name(), address = %device.address(), ?subsystems, "device added");
        }
        Ok(id)
    }

    /// Bind the named device to a group address written in the room's style.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unknown devices or bad address text.
    pub fn attach(&mut self, name: &str, group_address: &str) -> Result<AttachOutcome, ConfigError> {
        let address = GroupAddress::parse(group_address, self.bus.style())?;
        let id = self.lookup(name)?;
        self.bus.attach(id, &mut self.devices, address)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for unknown devices or bad address text. A
    /// missing binding is not an error and yields `Ok(false)`.
    pub fn detach(&mut self, name: &str, group_address: &str) -> Result<bool, ConfigError> {
        let address = GroupAddress::parse(group_address, self.bus.style())?;
        let id = self.lookup(name)?;
        Ok(self.bus.detach(id, &mut self.devices, address))
    }

    /// Detach the named device from the bus and the world, then drop it from
    /// the room.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownDevice` if no such device exists.
    pub fn remove_device(&mut self, name: &str) -> Result<Device, ConfigError> {
        let id = self.lookup(name)?;
        self.bus.detach_all(id, &mut self.devices);
        self.world.unregister(id);
        let device = self
            .devices
            .remove(id)
            .ok_or_else(|| ConfigError::UnknownDevice(name.to_string()))?;
        info!(device = name, "device removed");
        Ok(device)
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if the device is unknown or not an actuator.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        let id = self.lookup(name)?;
        let actuator = self
            .devices
            .get_mut(id)
            .and_then(Device::as_actuator_mut)
            .ok_or_else(|| ConfigError::InvalidDevice {
                name: name.to_string(),
                reason: "only actuators can be enabled or disabled",
            })?;
        actuator.set_enabled(enabled);
        Ok(())
    }

    /// Activate a functional module: one telegram per bound group address,
    /// each forwarded to the gateway and dispatched on the bus.
    ///
    /// A module without bindings produces nothing; that is logged, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `CommandError` for unknown devices, non-modules or a bad ratio.
    pub fn user_input(&mut self, name: &str, input: &UserInput) -> Result<Vec<DispatchReport>, CommandError> {
        let id = self
            .devices
            .find(name)
            .ok_or_else(|| CommandError::UnknownDevice(name.to_string()))?;
        let telegrams = self
            .devices
            .get_mut(id)
            .ok_or_else(|| CommandError::UnknownDevice(name.to_string()))?
            .user_input(input)?;

        if telegrams.is_empty() {
            warn!(device = name, "functional module has no group address, input not routed");
            return Ok(Vec::new());
        }

        let mut reports = Vec::with_capacity(telegrams.len());
        for telegram in &telegrams {
            if let Some(gateway) = self.gateway.as_mut() {
                gateway.outbound(telegram);
            }
            debug!(%telegram, "user input");
            reports.push(self.bus.transmit(telegram, &mut self.devices));
        }
        Ok(reports)
    }

    /// Dispatch a telegram that arrived from outside the room.
    pub fn receive(&mut self, telegram: &Telegram) -> DispatchReport {
        self.bus.transmit(telegram, &mut self.devices)
    }

    /// One tick: drain inbound gateway telegrams, then advance the world.
    ///
    /// Not re-entrant; the caller must not start a tick before the previous
    /// one returned.
    pub fn update_world(&mut self) -> Vec<AmbientUpdate> {
        if let Some(gateway) = self.gateway.as_mut() {
            while let Some(telegram) = gateway.poll_inbound() {
                self.bus.transmit(&telegram, &mut self.devices);
            }
        }
        self.world.update(&mut self.devices)
    }

    pub fn pause(&mut self) {
        self.world.pause();
    }

    pub fn resume(&mut self) {
        self.world.resume();
    }

    /// Add or remove an entity from the room for presence detection.
    pub fn set_presence(&mut self, entity: &str, present: bool) -> bool {
        if present {
            self.world.add_entity(entity)
        } else {
            self.world.remove_entity(entity)
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if the device is not a registered soil sensor.
    pub fn set_soil_moisture(&mut self, name: &str, value: f64) -> Result<(), ConfigError> {
        let id = self.lookup(name)?;
        if self.world.set_soil_moisture(id, value) {
            Ok(())
        } else {
            Err(ConfigError::InvalidDevice {
                name: name.to_string(),
                reason: "not a soil moisture sensor",
            })
        }
    }

    pub fn get_room_info(&self) -> RoomInfo {
        RoomInfo {
            name: self.name.clone(),
            dimensions: self.world.dimensions(),
            style: self.bus.style(),
            state: self.world.state(),
            devices: self.devices.iter().map(|(_, d)| d.info()).collect(),
        }
    }

    pub fn get_device_info(&self, name: &str) -> Option<DeviceInfo> {
        self.device(name).map(Device::info)
    }

    pub fn get_bus_info(&self) -> BusInfo {
        self.bus.info(&self.devices)
    }

    pub fn get_world_info(&self) -> WorldInfo {
        self.world.info(&self.devices)
    }
}
