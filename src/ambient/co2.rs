use super::{is_sensor, write_sensors, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext};
use crate::device::{Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;

/// Indoor CO2 concentration in ppm, relaxing toward the outdoor level.
#[derive(Debug, Clone)]
pub struct Co2 {
    co2_in: f64,
    sensors: Vec<DeviceId>,
}

impl Co2 {
    pub fn new(co2_in: f64) -> Self {
        Self {
            co2_in: co2_in.max(0.0),
            sensors: Vec::new(),
        }
    }

    pub fn co2_in(&self) -> f64 {
        self.co2_in
    }
}

impl AmbientSubsystem for Co2 {
    fn kind(&self) -> AmbientKind {
        AmbientKind::Co2
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        let wanted = is_sensor(device, SensorKind::Co2);
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
        ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError> {
        let next = ctx
            .insulation
            .relax(self.co2_in, ctx.outdoor.co2, ctx.update_rule_ratio)
            .max(0.0);
        if !next.is_finite() {
            return Err(AmbientError::NonFinite { quantity: "co2" });
        }
        self.co2_in = next;
        Ok(write_sensors(&self.sensors, devices, Reading::Level(next)))
    }
}
