use super::{is_sensor, write_sensors, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext};
use crate::device::{Actuator, ActuatorKind, Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;

pub const MIN_TEMPERATURE_C: f64 = 10.0;
pub const MAX_TEMPERATURE_C: f64 = 30.0;

/// Indoor temperature driven by heaters, air conditioners and insulation.
#[derive(Debug, Clone)]
pub struct Temperature {
    temperature_in: f64,
    sources: Vec<DeviceId>,
    sensors: Vec<DeviceId>,
}

impl Temperature {
    pub fn new(temperature_in: f64) -> Self {
        Self {
            temperature_in: temperature_in.clamp(MIN_TEMPERATURE_C, MAX_TEMPERATURE_C),
            sources: Vec::new(),
            sensors: Vec::new(),
        }
    }

    pub fn temperature_in(&self) -> f64 {
        self.temperature_in
    }

    pub fn set_temperature_in(&mut self, value: f64) {
        self.temperature_in = value.clamp(MIN_TEMPERATURE_C, MAX_TEMPERATURE_C);
    }

    pub fn sources(&self) -> &[DeviceId] {
        &self.sources
    }

    /// Per-tick change contributed by the thermal actuators.
    fn source_delta(&self, devices: &DeviceStore, update_rule_ratio: f64) -> f64 {
        let actuators: Vec<&Actuator> = self
            .sources
            .iter()
            .filter_map(|id| devices.get(*id))
            .filter_map(Device::as_actuator)
            .collect();

        let total_power: f64 = actuators.iter().map(|a| a.max_power()).sum();
        if total_power <= 0.0 {
            return 0.0;
        }

        actuators
            .iter()
            .filter(|a| a.enabled())
            .map(|a| {
                let update_rule = match a.kind() {
                    ActuatorKind::Heater { update_rule, .. }
                    | ActuatorKind::AirConditioner { update_rule, .. } => update_rule,
                    _ => 0.0,
                };
                update_rule * (a.power() / total_power) * update_rule_ratio
            })
            .sum()
    }
}

impl AmbientSubsystem for Temperature {
    fn kind(&self) -> AmbientKind {
        AmbientKind::Temperature
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        if device.as_actuator().is_some_and(|a| a.kind().is_thermal()) {
            self.sources.push(id);
            true
        } else if is_sensor(device, SensorKind::Temperature) {
            self.sensors.push(id);
            true
        } else {
            false
        }
    }

    fn unregister(&mut self, id: DeviceId) {
        self.sources.retain(|s| *s != id);
        self.sensors.retain(|s| *s != id);
    }

    fn update(
        &mut self,
        ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError> {
        let previous = self.temperature_in;
        let heated = previous + self.source_delta(devices, ctx.update_rule_ratio);
        let next = ctx
            .insulation
            .relax(heated, ctx.outdoor.temperature, ctx.update_rule_ratio);
        if !next.is_finite() {
            return Err(AmbientError::NonFinite { quantity: "temperature" });
        }

        self.temperature_in = next.clamp(MIN_TEMPERATURE_C, MAX_TEMPERATURE_C);
        ctx.previous_temperature = previous;
        ctx.temperature = self.temperature_in;

        Ok(write_sensors(&self.sensors, devices, Reading::Level(self.temperature_in)))
    }
}
