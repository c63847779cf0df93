pub mod co2;
pub mod humidity;
pub mod light;
pub mod presence;
pub mod soil;
pub mod temperature;

pub use co2::Co2;
pub use humidity::Humidity;
pub use light::Light;
pub use presence::Presence;
pub use soil::SoilMoisture;
pub use temperature::Temperature;

use crate::device::{Device, DeviceId, DeviceStore, Reading, SensorKind};
use crate::error::AmbientError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmbientKind {
    Light,
    Temperature,
    Humidity,
    Co2,
    SoilMoisture,
    Presence,
}

/// How fast indoor quantities relax toward their outdoor reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Insulation {
    Perfect,
    Good,
    Average,
    Bad,
}

impl Insulation {
    /// Fraction of the indoor/outdoor gap closed per simulated hour.
    pub const fn coefficient(self) -> f64 {
        match self {
            Insulation::Perfect => 0.0,
            Insulation::Good => 0.1,
            Insulation::Average => 0.25,
            Insulation::Bad => 0.5,
        }
    }

    /// Move `current` toward `target` for one tick. Never overshoots.
    pub fn relax(self, current: f64, target: f64, update_rule_ratio: f64) -> f64 {
        let step = (self.coefficient() * update_rule_ratio).clamp(0.0, 1.0);
        current + (target - current) * step
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Clear,
    Overcast,
    Dark,
}

/// Outdoor reference values. Constant during a run unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutdoorConditions {
    pub temperature: f64,
    pub humidity: f64,
    pub co2: f64,
    pub weather: Weather,
}

/// Shared state threaded through one tick of the ambient pipeline.
///
/// Earlier steps publish their fresh outputs here for later steps.
#[derive(Debug, Clone)]
pub struct TickContext {
    pub date_time: NaiveDateTime,
    pub update_rule_ratio: f64,
    pub insulation: Insulation,
    pub latitude: f64,
    pub outdoor: OutdoorConditions,
    pub outdoor_lux: f64,
    pub previous_temperature: f64,
    pub temperature: f64,
}

/// One sensor touched by an ambient step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbientUpdate {
    pub sensor: String,
    pub reading: Reading,
}

/// One physical quantity of the room.
///
/// Subsystems keep the ids of the devices they care about; the world hands
/// them the device store on every tick.
pub trait AmbientSubsystem {
    fn kind(&self) -> AmbientKind;

    /// Register `device` if this subsystem reads or writes it. Returns whether
    /// it was registered.
    fn register(&mut self, id: DeviceId, device: &Device) -> bool;

    fn unregister(&mut self, id: DeviceId);

    /// # Errors
    ///
    /// Returns an `AmbientError` when the step cannot produce a valid value;
    /// the previous state is then left untouched.
    fn update(
        &mut self,
        ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError>;
}

/// Set every sensor in `ids` to `reading`.
pub(crate) fn write_sensors(ids: &[DeviceId], devices: &mut DeviceStore, reading: Reading) -> Vec<AmbientUpdate> {
    let mut updates = Vec::new();
    for id in ids {
        let Some(device) = devices.get_mut(*id) else { continue };
        let name = device.name().to_string();
        if let Some(sensor) = device.as_sensor_mut() {
            sensor.set_reading(reading);
            updates.push(AmbientUpdate { sensor: name, reading });
        }
    }
    updates
}

pub(crate) fn is_sensor(device: &Device, kind: SensorKind) -> bool {
    device.sensor_kind() == Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relax_never_overshoots() {
        let t = Insulation::Bad.relax(25.0, 15.0, 10.0);
        assert!((t - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_insulation_holds() {
        assert_eq!(Insulation::Perfect.relax(25.0, 15.0, 0.5), 25.0);
    }
}
