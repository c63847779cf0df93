//! # KNX Room Simulator
//!
//! A tick-driven simulation of one room equipped with KNX building automation
//! devices. Functional modules (buttons, switches, dimmers, thermostats) emit
//! telegrams onto a group-address bus; actuators (LEDs, heaters, air
//! conditioners, windows) react to them; an ambient world model evolves
//! light, temperature, humidity, CO2, soil moisture and presence, and writes
//! the results into sensors.
//!
//! ## Features
//!
//! - **Addressing**: individual addresses and free / 2-level / 3-level group
//!   addresses with bounds checking
//! - **Bus dispatch**: per-address fan-out with fault isolation between actuators
//! - **Ambient model**: ordered per-tick pipeline with insulation-based relaxation
//! - **Command protocol**: newline-delimited JSON commands and responses
//! - **Telemetry**: periodic room snapshots
//!
//! ## Quick Start
//!
//! ```rust
//! use knxsim::{
//!     ActuatorKind, Device, GroupAddressStyle, IndividualAddress, KnxBus, ModuleKind, Room,
//!     RoomDimensions, SimulationConfig, UserInput, World,
//! };
//!
//! let dimensions = RoomDimensions::new(5.0, 4.0, 2.5)?;
//! let world = World::new(&SimulationConfig::default(), dimensions)?;
//! let mut room = Room::new("office", world, KnxBus::new(GroupAddressStyle::ThreeLevel))?;
//!
//! let button = Device::functional_module("button", IndividualAddress::new(1, 1, 1)?, ModuleKind::Button)?;
//! let led = Device::actuator(
//!     "led",
//!     IndividualAddress::new(1, 1, 2)?,
//!     ActuatorKind::Led { lumen: 800.0, beam_angle: 120.0 },
//! )?;
//! room.add_device(button, 0.0, 0.0, 1.0)?;
//! room.add_device(led, 2.5, 2.0, 2.5)?;
//! room.attach("button", "1/1/1")?;
//! room.attach("led", "1/1/1")?;
//!
//! room.user_input("button", &UserInput::default())?;
//! assert!(room.device("led").and_then(|d| d.as_actuator()).map_or(false, |a| a.state()));
//!
//! room.update_world();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`room`] - Orchestrator and public API
//! - [`bus`] - Group address bus and telegram dispatch
//! - [`device`] - Sensors, actuators and functional modules
//! - [`world`] - Clock and ambient pipeline
//! - [`ambient`] - One module per physical quantity
//! - [`protocol`] - Command/response protocol handling
//! - [`scheduler`] - Tick drivers
//! - [`gateway`] - Bridge to an external KNX/IP gateway
//! - [`telemetry`] - Room snapshots

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod address;
pub mod ambient;
pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod gateway;
pub mod geometry;
pub mod protocol;
pub mod room;
pub mod scheduler;
pub mod telegram;
pub mod telemetry;
pub mod world;

// Re-export main public types for convenience
pub use address::{GroupAddress, GroupAddressStyle, IndividualAddress};
pub use ambient::{Insulation, Weather};
pub use bus::{AttachOutcome, DispatchReport, KnxBus};
pub use config::SimulationConfig;
pub use device::{ActuatorKind, Device, DeviceId, ModuleKind, SensorKind, UserInput};
pub use error::{CommandError, ConfigError};
pub use geometry::RoomDimensions;
pub use protocol::{Command, CommandResponse, ProtocolHandler};
pub use room::Room;
pub use telegram::{Payload, Telegram};
pub use world::World;
