//! Device model: sensors, actuators and functional modules.
//!
//! Every device is one [`Device`] value carrying a [`DeviceRole`]. Role
//! specific behaviour lives on the role structs:
//!
//! - [`Sensor`] is passive; its reading is written by the ambient subsystem
//!   owning its quantity.
//! - [`Actuator::update_state`] is the only mutator of actuator state and is
//!   driven by telegrams from the bus.
//! - [`FunctionalModule::user_input`] turns user intent into one telegram per
//!   bound group address.

use crate::address::{GroupAddress, IndividualAddress};
use crate::error::{CommandError, ConfigError, DeviceFault};
use crate::telegram::{Payload, Telegram};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_BINDINGS: usize = 16;

pub type GroupBindings = heapless::Vec<GroupAddress, MAX_BINDINGS>;

/// Handle of a device inside its room. Allocated in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Human readable device name, unique within a room.
///
/// ASCII letters, digits, `_` and `-`, at most 32 characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceName(ArrayString<MAX_NAME_LEN>);

impl DeviceName {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDeviceName` for empty, oversized or
    /// non-identifier names.
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ConfigError::InvalidDeviceName(name.to_string()));
        }
        ArrayString::from(name)
            .map(Self)
            .map_err(|_| ConfigError::InvalidDeviceName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position inside the room, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Brightness,
    Temperature,
    Humidity,
    Co2,
    SoilMoisture,
    Presence,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reading {
    Unset,
    Level(f64),
    Presence(bool),
}

impl Reading {
    pub fn level(self) -> Option<f64> {
        match self {
            Reading::Level(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    kind: SensorKind,
    reading: Reading,
}

impl Sensor {
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn reading(&self) -> Reading {
        self.reading
    }

    pub(crate) fn set_reading(&mut self, reading: Reading) {
        self.reading = reading;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ActuatorKind {
    /// `lumen` at full ratio, `beam_angle` in degrees.
    Led { lumen: f64, beam_angle: f64 },
    /// `update_rule` is the temperature change per simulated hour at full
    /// power, in °C. Must be `>= 0`.
    Heater { max_power: f64, update_rule: f64 },
    /// Same as `Heater` but cooling: `update_rule <= 0`.
    AirConditioner { max_power: f64, update_rule: f64 },
    /// Window with blinds, sized in metres. Opening ratio set by dimmer telegrams.
    Window { width: f64, height: f64 },
}

impl ActuatorKind {
    fn validate(&self) -> Result<(), &'static str> {
        match *self {
            ActuatorKind::Led { lumen, beam_angle } => {
                if !(lumen.is_finite() && lumen >= 0.0) {
                    return Err("lumen must be a non-negative number");
                }
                if !(beam_angle > 0.0 && beam_angle <= 360.0) {
                    return Err("beam angle must be in (0, 360] degrees");
                }
            }
            ActuatorKind::Heater { max_power, update_rule } => {
                check_max_power(max_power)?;
                if !(update_rule.is_finite() && update_rule >= 0.0) {
                    return Err("heater update rule must be >= 0");
                }
            }
            ActuatorKind::AirConditioner { max_power, update_rule } => {
                check_max_power(max_power)?;
                if !(update_rule.is_finite() && update_rule <= 0.0) {
                    return Err("air conditioner update rule must be <= 0");
                }
            }
            ActuatorKind::Window { width, height } => {
                if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
                    return Err("window size must be positive");
                }
            }
        }
        Ok(())
    }

    pub fn is_thermal(&self) -> bool {
        matches!(
            self,
            ActuatorKind::Heater { .. } | ActuatorKind::AirConditioner { .. }
        )
    }
}

fn check_max_power(max_power: f64) -> Result<(), &'static str> {
    if max_power.is_finite() && max_power > 0.0 {
        Ok(())
    } else {
        Err("max power must be positive")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    kind: ActuatorKind,
    enabled: bool,
    state: bool,
    state_ratio: u8,
    power: f64,
}

impl Actuator {
    fn new(kind: ActuatorKind) -> Self {
        // windows start with blinds fully open
        let (state, state_ratio) = match kind {
            ActuatorKind::Window { .. } => (true, 100),
            _ => (false, 100),
        };
        Self {
            kind,
            enabled: true,
            state,
            state_ratio,
            power: 0.0,
        }
    }

    pub fn kind(&self) -> ActuatorKind {
        self.kind
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn state_ratio(&self) -> u8 {
        self.state_ratio
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    /// Rated power for thermal actuators, 0 otherwise.
    pub fn max_power(&self) -> f64 {
        match self.kind {
            ActuatorKind::Heater { max_power, .. }
            | ActuatorKind::AirConditioner { max_power, .. } => max_power,
            _ => 0.0,
        }
    }

    /// Luminous flux currently emitted by an LED.
    pub fn effective_lumen(&self) -> f64 {
        match self.kind {
            ActuatorKind::Led { lumen, .. } if self.state => {
                lumen * (f64::from(self.state_ratio) / 100.0)
            }
            _ => 0.0,
        }
    }

    /// Apply a telegram. Returns whether the actuator state changed.
    ///
    /// Read telegrams and unsupported `(kind, payload)` pairs are ignored.
    ///
    /// # Errors
    ///
    /// Returns a `DeviceFault` if the actuator is disabled or the payload
    /// cannot be applied.
    pub fn update_state(&mut self, name: &str, telegram: &Telegram) -> Result<bool, DeviceFault> {
        if !telegram.is_write() {
            return Ok(false);
        }
        if !self.enabled {
            return Err(DeviceFault::Disabled(name.to_string()));
        }

        match (self.kind, telegram.payload()) {
            (ActuatorKind::Led { .. }, Payload::Binary(true)) => {
                self.state = !self.state;
                Ok(true)
            }
            (ActuatorKind::Led { .. }, Payload::Dimmer { on: true, ratio }) => {
                self.state = !self.state;
                if self.state {
                    self.state_ratio = ratio.min(100);
                }
                Ok(true)
            }
            (ActuatorKind::Window { .. }, Payload::Binary(open)) => {
                self.set_opening(if open { 100 } else { 0 });
                Ok(true)
            }
            (ActuatorKind::Window { .. }, Payload::Dimmer { on, ratio }) => {
                self.set_opening(if on { ratio.min(100) } else { 0 });
                Ok(true)
            }
            (
                ActuatorKind::Heater { max_power, .. }
                | ActuatorKind::AirConditioner { max_power, .. },
                Payload::HeaterPower(requested),
            ) => {
                if !requested.is_finite() {
                    return Err(DeviceFault::NonFinitePower {
                        name: name.to_string(),
                        power: requested,
                    });
                }
                self.power = requested.clamp(0.0, max_power);
                self.state = self.power > 0.0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_opening(&mut self, ratio: u8) {
        self.state_ratio = ratio;
        self.state = ratio > 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Sends a `Binary(true)` pulse.
    Button,
    /// Sends `Binary(on)`; toggles its own position when `on` is omitted.
    Switch,
    /// Sends `Dimmer { on, ratio }`.
    Dimmer,
    /// Sends `HeaterPower(power)`.
    ThermostatController,
}

/// User intent passed to a functional module. Unused fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserInput {
    pub on: Option<bool>,
    pub ratio: Option<u8>,
    pub power: Option<f64>,
}

impl UserInput {
    pub fn switch(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Self::default()
        }
    }

    pub fn dimmer(on: bool, ratio: u8) -> Self {
        Self {
            on: Some(on),
            ratio: Some(ratio),
            power: None,
        }
    }

    pub fn power(power: f64) -> Self {
        Self {
            power: Some(power),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalModule {
    kind: ModuleKind,
    state: bool,
}

impl FunctionalModule {
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Last position of a switch; always `false` for other kinds.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Build one write telegram per bound group address.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidRatio` if the ratio exceeds 100.
    pub fn user_input(
        &mut self,
        source: IndividualAddress,
        bindings: &[GroupAddress],
        input: &UserInput,
    ) -> Result<Vec<Telegram>, CommandError> {
        let payload = match self.kind {
            ModuleKind::Button => Payload::Binary(true),
            ModuleKind::Switch => {
                let on = input.on.unwrap_or(!self.state);
                self.state = on;
                Payload::Binary(on)
            }
            ModuleKind::Dimmer => {
                let ratio = input.ratio.unwrap_or(100);
                if ratio > 100 {
                    return Err(CommandError::InvalidRatio(ratio));
                }
                Payload::Dimmer {
                    on: input.on.unwrap_or(true),
                    ratio,
                }
            }
            ModuleKind::ThermostatController => Payload::HeaterPower(input.power.unwrap_or(0.0)),
        };

        Ok(bindings
            .iter()
            .map(|&destination| Telegram::write(source, destination, payload))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceRole {
    Sensor(Sensor),
    Actuator(Actuator),
    Module(FunctionalModule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    name: DeviceName,
    address: IndividualAddress,
    location: Location,
    role: DeviceRole,
    group_addresses: GroupBindings,
}

impl Device {
    fn new(name: &str, address: IndividualAddress, role: DeviceRole) -> Result<Self, ConfigError> {
        Ok(Self {
            name: DeviceName::new(name)?,
            address,
            location: Location::default(),
            role,
            group_addresses: GroupBindings::new(),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDeviceName` for a bad name.
    pub fn sensor(name: &str, address: IndividualAddress, kind: SensorKind) -> Result<Self, ConfigError> {
        let reading = match kind {
            SensorKind::Presence => Reading::Presence(false),
            _ => Reading::Unset,
        };
        Self::new(name, address, DeviceRole::Sensor(Sensor { kind, reading }))
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDevice` when the kind parameters are out
    /// of range (e.g. a heater with a negative update rule).
    pub fn actuator(name: &str, address: IndividualAddress, kind: ActuatorKind) -> Result<Self, ConfigError> {
        kind.validate().map_err(|reason| ConfigError::InvalidDevice {
            name: name.to_string(),
            reason,
        })?;
        Self::new(name, address, DeviceRole::Actuator(Actuator::new(kind)))
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDeviceName` for a bad name.
    pub fn functional_module(name: &str, address: IndividualAddress, kind: ModuleKind) -> Result<Self, ConfigError> {
        Self::new(
            name,
            address,
            DeviceRole::Module(FunctionalModule { kind, state: false }),
        )
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn device_name(&self) -> DeviceName {
        self.name
    }

    pub fn address(&self) -> IndividualAddress {
        self.address
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub(crate) fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn role(&self) -> &DeviceRole {
        &self.role
    }

    pub fn as_sensor(&self) -> Option<&Sensor> {
        match &self.role {
            DeviceRole::Sensor(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_sensor_mut(&mut self) -> Option<&mut Sensor> {
        match &mut self.role {
            DeviceRole::Sensor(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_actuator(&self) -> Option<&Actuator> {
        match &self.role {
            DeviceRole::Actuator(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_actuator_mut(&mut self) -> Option<&mut Actuator> {
        match &mut self.role {
            DeviceRole::Actuator(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&FunctionalModule> {
        match &self.role {
            DeviceRole::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_actuator(&self) -> bool {
        matches!(self.role, DeviceRole::Actuator(_))
    }

    pub fn sensor_kind(&self) -> Option<SensorKind> {
        self.as_sensor().map(Sensor::kind)
    }

    pub fn group_addresses(&self) -> &[GroupAddress] {
        &self.group_addresses
    }

    pub fn is_bound(&self, group_address: GroupAddress) -> bool {
        self.group_addresses.contains(&group_address)
    }

    /// Only the bus calls this, so bindings always mirror bus membership.
    pub(crate) fn bind(&mut self, group_address: GroupAddress) -> Result<(), ConfigError> {
        self.group_addresses
            .push(group_address)
            .map_err(|_| ConfigError::TooManyBindings(self.name.to_string()))
    }

    pub(crate) fn unbind(&mut self, group_address: GroupAddress) -> bool {
        match self.group_addresses.iter().position(|ga| *ga == group_address) {
            Some(index) => {
                self.group_addresses.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver a telegram. Non-actuators ignore it.
    ///
    /// # Errors
    ///
    /// Propagates the actuator's `DeviceFault`.
    pub fn update_state(&mut self, telegram: &Telegram) -> Result<bool, DeviceFault> {
        let name = self.name;
        match &mut self.role {
            DeviceRole::Actuator(actuator) => actuator.update_state(name.as_str(), telegram),
            DeviceRole::Sensor(_) | DeviceRole::Module(_) => Ok(false),
        }
    }

    /// Telegrams produced by pressing this device.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::NotFunctionalModule` for sensors and actuators.
    pub fn user_input(&mut self, input: &UserInput) -> Result<Vec<Telegram>, CommandError> {
        let source = self.address;
        match &mut self.role {
            DeviceRole::Module(module) => module.user_input(source, &self.group_addresses, input),
            _ => Err(CommandError::NotFunctionalModule(self.name.to_string())),
        }
    }

    pub fn info(&self) -> DeviceInfo {
        let (role, kind, state) = match &self.role {
            DeviceRole::Sensor(s) => (
                "sensor",
                format!("{:?}", s.kind),
                DeviceStateInfo::Sensor { reading: s.reading },
            ),
            DeviceRole::Actuator(a) => (
                "actuator",
                kind_label(&a.kind).to_string(),
                DeviceStateInfo::Actuator {
                    enabled: a.enabled,
                    state: a.state,
                    state_ratio: a.state_ratio,
                    power: a.power,
                },
            ),
            DeviceRole::Module(m) => (
                "functional_module",
                format!("{:?}", m.kind),
                DeviceStateInfo::Module { state: m.state },
            ),
        };
        DeviceInfo {
            name: self.name.to_string(),
            address: self.address.to_string(),
            role,
            kind,
            location: self.location,
            group_addresses: self.group_addresses.iter().map(ToString::to_string).collect(),
            state,
        }
    }
}

fn kind_label(kind: &ActuatorKind) -> &'static str {
    match kind {
        ActuatorKind::Led { .. } => "Led",
        ActuatorKind::Heater { .. } => "Heater",
        ActuatorKind::AirConditioner { .. } => "AirConditioner",
        ActuatorKind::Window { .. } => "Window",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
    pub role: &'static str,
    pub kind: String,
    pub location: Location,
    pub group_addresses: Vec<String>,
    pub state: DeviceStateInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeviceStateInfo {
    Sensor { reading: Reading },
    Actuator { enabled: bool, state: bool, state_ratio: u8, power: f64 },
    Module { state: bool },
}

/// All devices placed in a room, keyed by [`DeviceId`] in insertion order.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: BTreeMap<DeviceId, Device>,
    next_id: u32,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: Device) -> DeviceId {
        let id = DeviceId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.devices.insert(id, device);
        id
    }

    pub fn remove(&mut self, id: DeviceId) -> Option<Device> {
        self.devices.remove(&id)
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn find(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .iter()
            .find(|(_, d)| d.name() == name)
            .map(|(id, _)| *id)
    }

    pub fn find_by_address(&self, address: IndividualAddress) -> Option<DeviceId> {
        self.devices
            .iter()
            .find(|(_, d)| d.address() == address)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter().map(|(id, d)| (*id, d))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
