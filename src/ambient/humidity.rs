use super::{is_sensor, write_sensors, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext};
use crate::device::{Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;

/// Saturation vapor pressure of water in Pa at `temperature` °C.
///
/// Only defined for `temperature > 0`.
///
/// # Errors
///
/// Returns `AmbientError::VaporPressureDomain` outside that domain.
pub fn saturation_vapor_pressure(temperature: f64) -> Result<f64, AmbientError> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(AmbientError::VaporPressureDomain(temperature));
    }
    Ok((34.494 - 4924.99 / (temperature + 237.1)).exp() / (temperature + 105.0).powf(1.57))
}

/// Relative humidity, in percent.
///
/// The absolute vapor pressure is held constant across a temperature change,
/// then the relative humidity relaxes toward the outdoor value.
#[derive(Debug, Clone)]
pub struct Humidity {
    humidity_in: f64,
    vapor_pressure: Option<f64>,
    sensors: Vec<DeviceId>,
}

impl Humidity {
    pub fn new(humidity_in: f64) -> Self {
        Self {
            humidity_in: humidity_in.clamp(0.0, 100.0),
            vapor_pressure: None,
            sensors: Vec::new(),
        }
    }

    pub fn humidity_in(&self) -> f64 {
        self.humidity_in
    }

    /// Absolute vapor pressure carried to the next tick, once known.
    pub fn vapor_pressure(&self) -> Option<f64> {
        self.vapor_pressure
    }
}

impl AmbientSubsystem for Humidity {
    fn kind(&self) -> AmbientKind {
        AmbientKind::Humidity
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        let wanted = is_sensor(device, SensorKind::Humidity);
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
        let p_sat = saturation_vapor_pressure(ctx.temperature)?;
        let vapor_pressure = match self.vapor_pressure {
            Some(p) => p,
            None => self.humidity_in / 100.0 * saturation_vapor_pressure(ctx.previous_temperature)?,
        };

        let shifted = (vapor_pressure / p_sat * 100.0).clamp(0.0, 100.0);
        let next = ctx
            .insulation
            .relax(shifted, ctx.outdoor.humidity, ctx.update_rule_ratio)
            .clamp(0.0, 100.0);
        if !next.is_finite() {
            return Err(AmbientError::NonFinite { quantity: "humidity" });
        }

        self.humidity_in = next;
        self.vapor_pressure = Some(next / 100.0 * p_sat);
        Ok(write_sensors(&self.sensors, devices, Reading::Level(next)))
    }
}
