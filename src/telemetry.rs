//! Periodic room snapshots for observers (the simulator streams them to
//! connected clients).

use crate::device::{DeviceStateInfo, Reading};
use crate::room::Room;
use crate::world::WorldState;
use chrono::NaiveDateTime;
use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SNAPSHOT_HISTORY_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub name: String,
    pub reading: Reading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSnapshot {
    pub name: String,
    pub enabled: bool,
    pub state: bool,
    pub state_ratio: u8,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub sequence_number: u32,
    pub room: String,
    pub date_time: NaiveDateTime,
    pub tick: u64,
    pub state: WorldState,
    pub temperature_in: f64,
    pub humidity_in: f64,
    pub co2_in: f64,
    pub outdoor_lux: f64,
    pub presence: bool,
    pub sensors: Vec<SensorSnapshot>,
    pub actuators: Vec<ActuatorSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub ticks_observed: u64,
    pub snapshots_emitted: u32,
}

/// Counts ticks and emits a [`RoomSnapshot`] every `interval_ticks` ticks.
#[derive(Debug)]
pub struct TelemetryCollector {
    interval_ticks: u32,
    ticks_since_snapshot: u32,
    sequence_number: u32,
    history: HistoryBuffer<RoomSnapshot, SNAPSHOT_HISTORY_SIZE>,
    stats: TelemetryStats,
}

impl TelemetryCollector {
    /// An interval of 0 is treated as 1.
    pub fn new(interval_ticks: u32) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            ticks_since_snapshot: 0,
            sequence_number: 0,
            history: HistoryBuffer::new(),
            stats: TelemetryStats::default(),
        }
    }

    pub fn interval_ticks(&self) -> u32 {
        self.interval_ticks
    }

    /// Record one tick. Returns a snapshot when the interval is reached.
    pub fn on_tick(&mut self, room: &Room) -> Option<RoomSnapshot> {
        self.stats.ticks_observed += 1;
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot < self.interval_ticks {
            return None;
        }
        self.ticks_since_snapshot = 0;
        let snapshot = self.snapshot(room);
        self.history.write(snapshot.clone());
        Some(snapshot)
    }

    /// Capture the room now, outside the tick cadence.
    pub fn snapshot(&mut self, room: &Room) -> RoomSnapshot {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.stats.snapshots_emitted += 1;

        let world = room.world();
        let mut sensors = Vec::new();
        let mut actuators = Vec::new();
        for (_, device) in room.devices().iter() {
            match device.info().state {
                DeviceStateInfo::Sensor { reading } => sensors.push(SensorSnapshot {
                    name: device.name().to_string(),
                    reading,
                }),
                DeviceStateInfo::Actuator {
                    enabled,
                    state,
                    state_ratio,
                    power,
                } => actuators.push(ActuatorSnapshot {
                    name: device.name().to_string(),
                    enabled,
                    state,
                    state_ratio,
                    power,
                }),
                DeviceStateInfo::Module { .. } => {}
            }
        }

        debug!(sequence = self.sequence_number, tick = world.clock().ticks(), "room snapshot");
        RoomSnapshot {
            sequence_number: self.sequence_number,
            room: room.name().to_string(),
            date_time: world.clock().date_time(),
            tick: world.clock().ticks(),
            state: world.state(),
            temperature_in: world.temperature_in(),
            humidity_in: world.humidity_in(),
            co2_in: world.co2_in(),
            outdoor_lux: world.outdoor_lux(),
            presence: world.presence(),
            sensors,
            actuators,
        }
    }

    /// Most recent snapshot, if any was emitted.
    pub fn latest(&self) -> Option<&RoomSnapshot> {
        self.history.recent()
    }

    /// Retained snapshots, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &RoomSnapshot> {
        self.history.oldest_ordered()
    }

    pub fn stats(&self) -> TelemetryStats {
        self.stats
    }
}
