//! Brightness from LEDs and windows.
//!
//! Outdoor illuminance comes from a reference table indexed by the phase of
//! the day and the weather. The phase is derived from sun events (dawn,
//! sunrise, noon, sunset, dusk) computed with a declination and hour-angle
//! model at the room's latitude, in local solar time.
//!
//! Each source is treated as a point emitter spreading its flux over the
//! solid angle of its beam; windows emit from their point closest to the
//! sensor.

use super::{is_sensor, AmbientKind, AmbientSubsystem, AmbientUpdate, TickContext, Weather};
use crate::device::{ActuatorKind, Device, DeviceId, DeviceStore, Location, Reading, SensorKind};
use crate::error::AmbientError;
use crate::geometry::{RoomDimensions, WallOpening};
use chrono::{Datelike, NaiveDateTime, Timelike};
use core::f64::consts::PI;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MIN_DISTANCE_M: f64 = 0.1;
const WINDOW_BEAM_ANGLE_DEG: f64 = 180.0;
const WINDOW_MIN_PASS_THROUGH: f64 = 0.2;

const SUNRISE_ELEVATION_DEG: f64 = -0.833;
const CIVIL_TWILIGHT_ELEVATION_DEG: f64 = -6.0;
const MAX_DECLINATION_DEG: f64 = 23.44;
const SOLAR_NOON_H: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayPhase {
    Night,
    Twilight,
    Day,
    Noon,
}

impl DayPhase {
    /// Reference outdoor illuminance in lux.
    pub fn lux(self, weather: Weather) -> f64 {
        match (self, weather) {
            (DayPhase::Noon, Weather::Clear) => 107_527.0,
            (DayPhase::Noon, Weather::Overcast) | (DayPhase::Day, Weather::Clear) => 10_752.0,
            (DayPhase::Noon, Weather::Dark) | (DayPhase::Day, Weather::Overcast) => 1_075.0,
            (DayPhase::Day, Weather::Dark) => 107.0,
            (DayPhase::Twilight, Weather::Clear) => 10.8,
            (DayPhase::Twilight, Weather::Overcast) => 1.08,
            (DayPhase::Twilight, Weather::Dark) | (DayPhase::Night, Weather::Clear) => 0.108,
            (DayPhase::Night, Weather::Overcast) => 0.0108,
            (DayPhase::Night, Weather::Dark) => 0.0011,
        }
    }
}

/// Hours of day (local solar time) at which the sun crosses an elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Crossing {
    AlwaysAbove,
    NeverAbove,
    Between(f64, f64),
}

impl Crossing {
    fn contains(self, hour: f64) -> bool {
        match self {
            Crossing::AlwaysAbove => true,
            Crossing::NeverAbove => false,
            Crossing::Between(rise, set) => (rise..=set).contains(&hour),
        }
    }
}

fn crossing(latitude_deg: f64, declination_rad: f64, elevation_deg: f64) -> Crossing {
    let phi = latitude_deg.to_radians();
    let cos_h = (elevation_deg.to_radians().sin() - phi.sin() * declination_rad.sin())
        / (phi.cos() * declination_rad.cos());
    if cos_h < -1.0 {
        Crossing::AlwaysAbove
    } else if cos_h > 1.0 {
        Crossing::NeverAbove
    } else {
        let half_day_h = cos_h.acos().to_degrees() / 15.0;
        Crossing::Between(SOLAR_NOON_H - half_day_h, SOLAR_NOON_H + half_day_h)
    }
}

fn declination(date_time: &NaiveDateTime) -> f64 {
    let day = f64::from(date_time.ordinal());
    (MAX_DECLINATION_DEG * (2.0 * PI / 365.0 * (284.0 + day)).sin()).to_radians()
}

/// Phase of the day at `date_time` for the given latitude.
pub fn day_phase(date_time: &NaiveDateTime, latitude_deg: f64) -> DayPhase {
    let hour = f64::from(date_time.hour())
        + f64::from(date_time.minute()) / 60.0
        + f64::from(date_time.second()) / 3600.0;
    let decl = declination(date_time);

    let daylight = crossing(latitude_deg, decl, SUNRISE_ELEVATION_DEG);
    let twilight = crossing(latitude_deg, decl, CIVIL_TWILIGHT_ELEVATION_DEG);

    match daylight {
        Crossing::Between(sunrise, sunset) if daylight.contains(hour) => {
            let noon_start = sunrise + (SOLAR_NOON_H - sunrise) / 2.0;
            let noon_end = SOLAR_NOON_H + (sunset - SOLAR_NOON_H) / 2.0;
            if (noon_start..=noon_end).contains(&hour) {
                DayPhase::Noon
            } else {
                DayPhase::Day
            }
        }
        Crossing::AlwaysAbove => DayPhase::Day,
        _ if twilight.contains(hour) => DayPhase::Twilight,
        _ => DayPhase::Night,
    }
}

/// Outdoor illuminance in lux.
pub fn outdoor_lux(date_time: &NaiveDateTime, latitude_deg: f64, weather: Weather) -> f64 {
    day_phase(date_time, latitude_deg).lux(weather)
}

/// Illuminance in lux at `distance` metres from a point source emitting
/// `lumen` over a cone of `beam_angle_deg`.
pub fn illuminance(lumen: f64, beam_angle_deg: f64, distance: f64) -> f64 {
    let half_angle = (beam_angle_deg / 2.0).to_radians();
    let solid_angle = 2.0 * PI * (1.0 - half_angle.cos());
    if solid_angle <= 0.0 || lumen <= 0.0 {
        return 0.0;
    }
    let distance = distance.max(MIN_DISTANCE_M);
    lumen / solid_angle / (distance * distance)
}

#[derive(Debug, Clone)]
pub struct Light {
    dimensions: RoomDimensions,
    leds: Vec<DeviceId>,
    windows: BTreeMap<DeviceId, WallOpening>,
    sensors: Vec<DeviceId>,
    outdoor_lux: f64,
}

impl Light {
    pub fn new(dimensions: RoomDimensions) -> Self {
        Self {
            dimensions,
            leds: Vec::new(),
            windows: BTreeMap::new(),
            sensors: Vec::new(),
            outdoor_lux: 0.0,
        }
    }

    pub fn outdoor_lux(&self) -> f64 {
        self.outdoor_lux
    }

    fn brightness_at(&self, target: &Location, devices: &DeviceStore) -> f64 {
        let from_leds: f64 = self
            .leds
            .iter()
            .filter_map(|id| devices.get(*id))
            .filter_map(|d| d.as_actuator().map(|a| (d.location(), a)))
            .map(|(location, led)| match led.kind() {
                ActuatorKind::Led { beam_angle, .. } => {
                    illuminance(led.effective_lumen(), beam_angle, location.distance_to(target))
                }
                _ => 0.0,
            })
            .sum();

        let from_windows: f64 = self
            .windows
            .iter()
            .filter_map(|(id, opening)| {
                devices.get(*id).and_then(Device::as_actuator).map(|a| (opening, a))
            })
            .map(|(opening, window)| {
                let pass = (f64::from(window.state_ratio()) / 100.0).max(WINDOW_MIN_PASS_THROUGH);
                let lumen = self.outdoor_lux * opening.width * opening.height * pass;
                let distance = opening.nearest_point(target).distance_to(target);
                illuminance(lumen, WINDOW_BEAM_ANGLE_DEG, distance)
            })
            .sum();

        from_leds + from_windows
    }
}

impl AmbientSubsystem for Light {
    fn kind(&self) -> AmbientKind {
        AmbientKind::Light
    }

    fn register(&mut self, id: DeviceId, device: &Device) -> bool {
        if is_sensor(device, SensorKind::Brightness) {
            self.sensors.push(id);
            return true;
        }
        match device.as_actuator().map(|a| a.kind()) {
            Some(ActuatorKind::Led { .. }) => {
                self.leds.push(id);
                true
            }
            Some(ActuatorKind::Window { width, height }) => {
                let center = device.location();
                // placement is validated by the room; skip windows off the walls
                let Some(wall) = self.dimensions.wall_of(&center) else {
                    return false;
                };
                self.windows.insert(id, WallOpening { wall, center, width, height });
                true
            }
            _ => false,
        }
    }

    fn unregister(&mut self, id: DeviceId) {
        self.leds.retain(|l| *l != id);
        self.windows.remove(&id);
        self.sensors.retain(|s| *s != id);
    }

    fn update(
        &mut self,
        ctx: &mut TickContext,
        devices: &mut DeviceStore,
    ) -> Result<Vec<AmbientUpdate>, AmbientError> {
        self.outdoor_lux = outdoor_lux(&ctx.date_time, ctx.latitude, ctx.outdoor.weather);
        ctx.outdoor_lux = self.outdoor_lux;

        let store: &DeviceStore = devices;
        let readings: Vec<(DeviceId, f64)> = self
            .sensors
            .iter()
            .filter_map(|id| store.get(*id).map(|d| (*id, d.location())))
            .map(|(id, location)| (id, self.brightness_at(&location, store)))
            .collect();

        // all or nothing: a bad reading leaves every sensor untouched
        if readings.iter().any(|(_, lux)| !lux.is_finite()) {
            return Err(AmbientError::NonFinite { quantity: "brightness" });
        }

        let mut updates = Vec::with_capacity(readings.len());
        for (id, lux) in readings {
            if let Some(device) = devices.get_mut(id) {
                let name = device.name().to_string();
                if let Some(sensor) = device.as_sensor_mut() {
                    let reading = Reading::Level(lux.max(0.0));
                    sensor.set_reading(reading);
                    updates.push(AmbientUpdate { sensor: name, reading });
                }
            }
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_day_phases_at_mid_latitude() {
        assert_eq!(day_phase(&at(6, 21, 0), 48.85), DayPhase::Night);
        assert_eq!(day_phase(&at(6, 21, 12), 48.85), DayPhase::Noon);
        assert_eq!(day_phase(&at(6, 21, 6), 48.85), DayPhase::Day);
    }

    #[test]
    fn test_polar_night_and_day() {
        assert_eq!(day_phase(&at(12, 21, 12), 85.0), DayPhase::Night);
        assert_eq!(day_phase(&at(6, 21, 0), 85.0), DayPhase::Day);
    }

    #[test]
    fn test_weather_darkens_outdoor_lux() {
        let noon = at(6, 21, 12);
        let clear = outdoor_lux(&noon, 48.85, Weather::Clear);
        let overcast = outdoor_lux(&noon, 48.85, Weather::Overcast);
        let dark = outdoor_lux(&noon, 48.85, Weather::Dark);
        assert!(clear > overcast && overcast > dark);
    }

    #[test]
    fn test_illuminance_inverse_square() {
        let near = illuminance(1000.0, 120.0, 1.0);
        let far = illuminance(1000.0, 120.0, 2.0);
        assert!((near / far - 4.0).abs() < 1e-9);
        assert_eq!(illuminance(0.0, 120.0, 1.0), 0.0);
    }
}
