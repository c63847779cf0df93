//! Discrete-time ambient world of one room.
//!
//! Each tick advances the clock and runs the ambient pipeline in a fixed
//! order: light, temperature, humidity, CO2, soil moisture, presence. Later
//! steps read what earlier steps produced in the same tick (humidity uses
//! the freshly updated temperature). A step that hits a numeric problem is
//! logged and skipped; the rest of the pipeline still runs.

use crate::ambient::{
    AmbientKind, AmbientSubsystem, AmbientUpdate, Co2, Humidity, Insulation, Light, OutdoorConditions,
    Presence, SoilMoisture, Temperature, TickContext, Weather,
};
use crate::config::{check_speed_factor, SimulationConfig};
use crate::device::{Device, DeviceId, DeviceStore};
use crate::error::ConfigError;
use crate::geometry::RoomDimensions;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldState {
    Running,
    Paused,
}

/// Simulated time. Each tick covers `system_dt * speed_factor` simulated seconds.
#[derive(Debug, Clone)]
pub struct Clock {
    date_time: NaiveDateTime,
    system_dt: f64,
    speed_factor: f64,
    ticks: u64,
}

impl Clock {
    pub fn new(start: NaiveDateTime, system_dt: f64, speed_factor: f64) -> Self {
        Self {
            date_time: start,
            system_dt,
            speed_factor,
            ticks: 0,
        }
    }

    pub fn date_time(&self) -> NaiveDateTime {
        self.date_time
    }

    pub fn system_dt(&self) -> f64 {
        self.system_dt
    }

    pub fn speed_factor(&self) -> f64 {
        self.speed_factor
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Converts a per-simulated-hour rate into a per-tick delta.
    pub fn update_rule_ratio(&self) -> f64 {
        self.system_dt * self.speed_factor / SECONDS_PER_HOUR
    }

    /// Move one tick forward. Returns `false` and leaves the clock untouched
    /// when the simulated date would leave the representable range.
    fn advance(&mut self) -> bool {
        // `as` saturates, so an absurd step lands on i64::MAX and is rejected below
        let simulated_ms = (self.system_dt * self.speed_factor * 1000.0).round() as i64;
        let next = Duration::try_milliseconds(simulated_ms)
            .and_then(|step| self.date_time.checked_add_signed(step));
        match next {
            Some(date_time) => {
                self.date_time = date_time;
                self.ticks += 1;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldInfo {
    pub date_time: NaiveDateTime,
    pub state: WorldState,
    pub ticks: u64,
    pub speed_factor: f64,
    pub insulation: Insulation,
    pub outdoor: OutdoorConditions,
    pub outdoor_lux: f64,
    pub temperature_in: f64,
    pub humidity_in: f64,
    pub co2_in: f64,
    pub soil_moisture: Vec<(String, f64)>,
    pub presence: bool,
}

#[derive(Debug, Clone)]
pub struct World {
    dimensions: RoomDimensions,
    clock: Clock,
    state: WorldState,
    insulation: Insulation,
    latitude: f64,
    outdoor: OutdoorConditions,
    light: Light,
    temperature: Temperature,
    humidity: Humidity,
    co2: Co2,
    soil: SoilMoisture,
    presence: Presence,
}

impl World {
    /// # Errors
    ///
    /// Returns the config's validation error.
    pub fn new(config: &SimulationConfig, dimensions: RoomDimensions) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            dimensions,
            clock: Clock::new(config.start, config.system_dt_s, config.speed_factor),
            state: WorldState::Running,
            insulation: config.insulation,
            latitude: config.latitude_deg,
            outdoor: config.outdoor,
            light: Light::new(dimensions),
            temperature: Temperature::new(config.initial_temperature),
            humidity: Humidity::new(config.initial_humidity),
            co2: Co2::new(config.initial_co2),
            soil: SoilMoisture::new(),
            presence: Presence::new(),
        })
    }

    fn subsystems(&mut self) -> [&mut dyn AmbientSubsystem; 6] {
        [
            &mut self.light,
            &mut self.temperature,
            &mut self.humidity,
            &mut self.co2,
            &mut self.soil,
            &mut self.presence,
        ]
    }

    /// Hand `device` to every subsystem that reads or writes it. Returns the
    /// subsystems that took it.
    pub fn register(&mut self, id: DeviceId, device: &Device) -> Vec<AmbientKind> {
        self.subsystems()
            .into_iter()
            .filter_map(|s| s.register(id, device).then(|| s.kind()))
            .collect()
    }

    pub fn unregister(&mut self, id: DeviceId) {
        for subsystem in self.subsystems() {
            subsystem.unregister(id);
        }
    }

    /// Run one tick. Does nothing while paused.
    pub fn update(&mut self, devices: &mut DeviceStore) -> Vec<AmbientUpdate> {
        if self.state == WorldState::Paused {
            return Vec::new();
        }

        if !self.clock.advance() {
            warn!(
                date_time = %self.clock.date_time(),
                speed_factor = self.clock.speed_factor(),
                "simulated clock out of range, tick skipped"
            );
            return Vec::new();
        }
        let temperature = self.temperature.temperature_in();
        let mut ctx = TickContext {
            date_time: self.clock.date_time(),
            update_rule_ratio: self.clock.update_rule_ratio(),
            insulation: self.insulation,
            latitude: self.latitude,
            outdoor: self.outdoor,
            outdoor_lux: self.light.outdoor_lux(),
            previous_temperature: temperature,
            temperature,
        };

        let mut updates = Vec::new();
        for subsystem in self.subsystems() {
            match subsystem.update(&mut ctx, devices) {
                Ok(touched) => updates.extend(touched),
                Err(e) => warn!(subsystem = ?subsystem.kind(), error = %e, "ambient step skipped"),
            }
        }
        debug!(tick = self.clock.ticks(), touched = updates.len(), "world updated");
        updates
    }

    pub fn pause(&mut self) {
        if self.state != WorldState::Paused {
            info!("world paused");
        }
        self.state = WorldState::Paused;
    }

    pub fn resume(&mut self) {
        if self.state != WorldState::Running {
            info!("world resumed");
        }
        self.state = WorldState::Running;
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn dimensions(&self) -> RoomDimensions {
        self.dimensions
    }

    pub fn insulation(&self) -> Insulation {
        self.insulation
    }

    pub fn outdoor(&self) -> OutdoorConditions {
        self.outdoor
    }

    pub fn temperature_in(&self) -> f64 {
        self.temperature.temperature_in()
    }

    pub fn humidity_in(&self) -> f64 {
        self.humidity.humidity_in()
    }

    pub fn co2_in(&self) -> f64 {
        self.co2.co2_in()
    }

    pub fn outdoor_lux(&self) -> f64 {
        self.light.outdoor_lux()
    }

    pub fn presence(&self) -> bool {
        self.presence.present()
    }

    pub fn soil_moisture(&self, id: DeviceId) -> Option<f64> {
        self.soil.moisture(id)
    }

    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` outside `(0, MAX_SPEED_FACTOR]`.
    pub fn set_speed_factor(&mut self, speed_factor: f64) -> Result<(), ConfigError> {
        check_speed_factor(speed_factor)?;
        self.clock.speed_factor = speed_factor;
        Ok(())
    }

    pub fn set_weather(&mut self, weather: Weather) {
        self.outdoor.weather = weather;
    }

    pub fn set_outdoor_temperature(&mut self, temperature: f64) {
        self.outdoor.temperature = temperature;
    }

    pub fn set_outdoor_humidity(&mut self, humidity: f64) {
        self.outdoor.humidity = humidity.clamp(0.0, 100.0);
    }

    pub fn set_outdoor_co2(&mut self, co2: f64) {
        self.outdoor.co2 = co2.max(0.0);
    }

    pub fn set_temperature_in(&mut self, temperature: f64) {
        self.temperature.set_temperature_in(temperature);
    }

    pub fn set_insulation(&mut self, insulation: Insulation) {
        self.insulation = insulation;
    }

    pub fn set_soil_moisture(&mut self, id: DeviceId, value: f64) -> bool {
        self.soil.set_moisture(id, value)
    }

    pub fn add_entity(&mut self, entity: &str) -> bool {
        self.presence.add_entity(entity)
    }

    pub fn remove_entity(&mut self, entity: &str) -> bool {
        self.presence.remove_entity(entity)
    }

    pub fn info(&self, devices: &DeviceStore) -> WorldInfo {
        WorldInfo {
            date_time: self.clock.date_time(),
            state: self.state,
            ticks: self.clock.ticks(),
            speed_factor: self.clock.speed_factor(),
            insulation: self.insulation,
            outdoor: self.outdoor,
            outdoor_lux: self.light.outdoor_lux(),
            temperature_in: self.temperature_in(),
            humidity_in: self.humidity_in(),
            co2_in: self.co2_in(),
            soil_moisture: self
                .soil
                .iter()
                .filter_map(|(id, m)| devices.get(id).map(|d| (d.name().to_string(), m)))
                .collect(),
            presence: self.presence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_rule_ratio() {
        let clock = Clock::new(NaiveDateTime::default(), 1.0, 180.0);
        assert!((clock.update_rule_ratio() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_clock_advances_simulated_time() {
        let mut clock = Clock::new(NaiveDateTime::default(), 2.0, 30.0);
        clock.advance();
        assert_eq!(clock.date_time() - NaiveDateTime::default(), Duration::seconds(60));
        assert_eq!(clock.ticks(), 1);
    }

    #[test]
    fn test_clock_refuses_to_leave_date_range() {
        let start = NaiveDateTime::MAX - Duration::seconds(30);
        let mut clock = Clock::new(start, 1.0, 60.0);
        assert!(!clock.advance());
        assert_eq!(clock.date_time(), start);
        assert_eq!(clock.ticks(), 0);
    }

    #[test]
    fn test_out_of_range_tick_is_skipped() {
        let config = SimulationConfig {
            start: NaiveDateTime::MAX - Duration::seconds(30),
            ..SimulationConfig::default()
        };
        let dims = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
        let mut world = World::new(&config, dims).unwrap();
        let mut devices = DeviceStore::new();
        assert!(world.update(&mut devices).is_empty());
        assert_eq!(world.clock().ticks(), 0);
        assert_eq!(world.clock().date_time(), config.start);
    }

    #[test]
    fn test_speed_factor_is_bounded() {
        let dims = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
        let mut world = World::new(&SimulationConfig::default(), dims).unwrap();
        assert!(world.set_speed_factor(1e15).is_err());
        assert!(world.set_speed_factor(0.0).is_err());
        assert!(world.set_speed_factor(3600.0).is_ok());
        assert_eq!(world.clock().speed_factor(), 3600.0);
    }

    #[test]
    fn test_paused_world_does_not_tick() {
        let dims = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
        let mut world = World::new(&SimulationConfig::default(), dims).unwrap();
        let mut devices = DeviceStore::new();
        world.pause();
        assert!(world.update(&mut devices).is_empty());
        assert_eq!(world.clock().ticks(), 0);
        world.resume();
        world.update(&mut devices);
        assert_eq!(world.clock().ticks(), 1);
    }
}
