use super::{is_sensor, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext};
use crate::device::{Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;
use std::collections::BTreeMap;

pub const INITIAL_MOISTURE_PERCENT: f64 = 35.0;
pub const MIN_MOISTURE_PERCENT: f64 = 10.0;
/// Drying rate per simulated hour.
pub const DRYING_RATE_PERCENT: f64 = 0.5;

/// Soil moisture, tracked per sensor. Only decays on its own.
#[derive(Debug, Clone, Default)]
pub struct SoilMoisture {
    moisture: BTreeMap<DeviceId, f64>,
}

impl SoilMoisture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moisture(&self, id: DeviceId) -> Option<f64> {
        self.moisture.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, f64)> + '_ {
        self.moisture.iter().map(|(id, m)| (*id, *m))
    }

    /// Explicit override, e.g. watering. Returns `false` for unknown sensors.
    pub fn set_moisture(&mut self, id: DeviceId, value: f64) -> bool {
        match self.moisture.get_mut(&id) {
            Some(m) => {
                *m = value.clamp(MIN_MOISTURE_PERCENT, 100.0);
                true
            }
            None => false,
        }
    }
}

impl AmbientSubsystem for SoilMoisture {
    fn kind(&self) -> AmbientKind {
        AmbientKind::SoilMoisture
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        let wanted = is_sensor(device, SensorKind::SoilMoisture);
        if wanted {
            self.moisture.insert(id, INITIAL_MOISTURE_PERCENT);
        }
        wanted
    }

    fn unregister(&mut self, id: DeviceId) {
        self.moisture.remove(&id);
    }

    fn update(
        &mut self,
        ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError> {
        let decay = DRYING_RATE_PERCENT * ctx.update_rule_ratio;
        if !decay.is_finite() {
            return Err(AmbientError::NonFinite { quantity: "soil moisture" });
        }

        let mut updates = Vec::with_capacity(self.moisture.len());
        for (id, moisture) in &mut self.moisture {
            *moisture = (*moisture - decay.max(0.0)).max(MIN_MOISTURE_PERCENT);
            if let Some(device) = devices.get_mut(*id) {
                let name = device.name().to_string();
                if let Some(sensor) = device.as_sensor_mut() {
                    let reading = Reading::Level(*moisture);
                    sensor.set_reading(reading);
                    updates.push(AmbientUpdate { sensor: name, reading });
                }
            }
        }
        Ok(updates)
    }
}
