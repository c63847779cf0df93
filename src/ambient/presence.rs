use super::{is_sensor, write_sensors, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext};
use crate::device::{Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;
use std::collections::BTreeSet;

/// Room-wide presence: true while at least one entity is in the room.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    entities: BTreeSet<String>,
    sensors: Vec<DeviceId>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(String::as_str)
    }

    /// Returns `false` if the entity was already present.
    pub fn add_entity(&mut self, entity: &str) -> bool {
        self.entities.insert(entity.to_string())
    }

    /// Returns `false` if the entity was not present.
    pub fn remove_entity(&mut self, entity: &str) -> bool {
        self.entities.remove(entity)
    }
}

impl AmbientSubsystem for Presence {
    fn kind(&self) -> AmbientKind {
        AmbientKind::Presence
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        let wanted = is_sensor(device, SensorKind::Presence);
        if wanted {
            self.sensors.push(id);
        }
        wanted
    }

    fn unregister(&mut self, id: DeviceId) {
        self.sensors.retain(|s| *s != id);
    }

    fn update(
        &mut self,
        _ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError> {
        Ok(write_sensors(&self.sensors, devices, Reading::Presence(self.present())))
    }
}
