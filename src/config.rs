use crate::ambient::{Insulation, OutdoorConditions, Weather};
use crate::error::ConfigError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const DEFAULT_SYSTEM_DT_S: f64 = 1.0;
const DEFAULT_SPEED_FACTOR: f64 = 180.0;
const DEFAULT_LATITUDE_DEG: f64 = 48.85;
const DEFAULT_TELEMETRY_INTERVAL_TICKS: u32 = 10;

/// One real second covers at most a simulated day.
pub const MAX_SPEED_FACTOR: f64 = 86_400.0;

pub(crate) fn check_speed_factor(speed_factor: f64) -> Result<(), ConfigError> {
    if speed_factor.is_finite() && speed_factor > 0.0 && speed_factor <= MAX_SPEED_FACTOR {
        Ok(())
    } else {
        Err(ConfigError::InvalidConfig("speed_factor must be within (0, 86400]"))
    }
}

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Real seconds between two ticks.
    pub system_dt_s: f64,
    /// Simulated seconds per real second.
    pub speed_factor: f64,
    pub insulation: Insulation,
    pub outdoor: OutdoorConditions,
    pub latitude_deg: f64,
    pub start: NaiveDateTime,
    pub initial_temperature: f64,
    pub initial_humidity: f64,
    pub initial_co2: f64,
    pub telemetry_interval_ticks: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            system_dt_s: DEFAULT_SYSTEM_DT_S,
            speed_factor: DEFAULT_SPEED_FACTOR,
            insulation: Insulation::Average,
            outdoor: OutdoorConditions {
                temperature: 20.0,
                humidity: 50.0,
                co2: 400.0,
                weather: Weather::Clear,
            },
            latitude_deg: DEFAULT_LATITUDE_DEG,
            start: NaiveDate::from_ymd_opt(2024, 6, 21)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap_or_default(),
            initial_temperature: 20.0,
            initial_humidity: 45.0,
            initial_co2: 800.0,
            telemetry_interval_ticks: DEFAULT_TELEMETRY_INTERVAL_TICKS,
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.system_dt_s.is_finite() && self.system_dt_s > 0.0) {
            return Err(ConfigError::InvalidConfig("system_dt_s must be positive"));
        }
        check_speed_factor(self.speed_factor)?;
        if !(-90.0..=90.0).contains(&self.latitude_deg) {
            return Err(ConfigError::InvalidConfig("latitude_deg must be within [-90, 90]"));
        }
        if !(0.0..=100.0).contains(&self.outdoor.humidity) || !(0.0..=100.0).contains(&self.initial_humidity) {
            return Err(ConfigError::InvalidConfig("humidity must be within [0, 100]"));
        }
        if !(self.outdoor.co2 >= 0.0 && self.initial_co2 >= 0.0) {
            return Err(ConfigError::InvalidConfig("co2 must be non-negative"));
        }
        if !(self.outdoor.temperature.is_finite() && self.initial_temperature.is_finite()) {
            return Err(ConfigError::InvalidConfig("temperatures must be finite"));
        }
        if self.telemetry_interval_ticks == 0 {
            return Err(ConfigError::InvalidConfig("telemetry_interval_ticks must be at least 1"));
        }
        Ok(())
    }
}
