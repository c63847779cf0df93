use crate::ambient::Weather;
use crate::device::UserInput;
use crate::error::ProtocolError;
use crate::room::Room;
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MAX_COMMAND_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 16384;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u32,
    pub command_type: CommandType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandType {
    Ping,
    /// Activate a functional module.
    Press {
        name: String,
        #[serde(default)]
        on: Option<bool>,
        #[serde(default)]
        ratio: Option<u8>,
        #[serde(default)]
        power: Option<f64>,
    },
    RoomInfo,
    DeviceInfo { name: String },
    BusInfo,
    WorldInfo,
    Pause,
    Resume,
    SetSpeed { factor: f64 },
    SetWeather { weather: Weather },
    SetPresence { entity: String, present: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    /// Human readable outcome, or JSON for info queries.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Error,
    InvalidCommand,
}

/// Parses, executes and serializes command-line traffic against one room.
#[derive(Debug)]
pub struct ProtocolHandler {
    command_counter: u32,
    command_buffer: CommandBuffer,
    response_buffer: ResponseBuffer,
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            command_counter: 0,
            command_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
        }
    }

    /// # Errors
    ///
    /// `MessageTooLarge` past [`MAX_COMMAND_SIZE`] bytes, `InvalidJson` otherwise.
    pub fn parse_command(&mut self, json_str: &str) -> Result<Command, ProtocolError> {
        self.command_buffer.clear();
        self.command_buffer
            .try_push_str(json_str)
            .map_err(|_| ProtocolError::MessageTooLarge)?;

        serde_json::from_str::<Command>(&self.command_buffer).map_err(|_| ProtocolError::InvalidJson)
    }

    /// # Errors
    ///
    /// `SerializationError` if serde fails, `MessageTooLarge` past
    /// [`MAX_RESPONSE_SIZE`] bytes.
    pub fn serialize_response(&mut self, response: &CommandResponse) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json_str = serde_json::to_string(response).map_err(|_| ProtocolError::SerializationError)?;
        self.response_buffer
            .try_push_str(&json_str)
            .map_err(|_| ProtocolError::MessageTooLarge)?;

        Ok(&self.response_buffer)
    }

    pub fn create_response(&self, command_id: u32, status: ResponseStatus, message: Option<String>) -> CommandResponse {
        CommandResponse {
            id: command_id,
            timestamp: current_timestamp(),
            status,
            message,
        }
    }

    pub fn next_command_id(&mut self) -> u32 {
        self.command_counter = self.command_counter.wrapping_add(1);
        self.command_counter
    }

    /// Run `command` against `room` and describe the outcome. Failures are
    /// reported in the response, never propagated.
    pub fn execute(&mut self, command: &Command, room: &mut Room) -> CommandResponse {
        debug!(id = command.id, command = ?command.command_type, "executing command");
        let outcome = match &command.command_type {
            CommandType::Ping => Ok("pong".to_string()),
            CommandType::Press { name, on, ratio, power } => {
                let input = UserInput {
                    on: *on,
                    ratio: *ratio,
                    power: *power,
                };
                room.user_input(name, &input)
                    .map(|reports| {
                        let delivered: usize = reports.iter().map(|r| r.delivered_count()).sum();
                        let faults: usize = reports.iter().map(|r| r.faults.len()).sum();
                        format!(
                            "{} sent {} telegram(s), {} actuator update(s), {} fault(s)",
                            name,
                            reports.len(),
                            delivered,
                            faults
                        )
                    })
                    .map_err(|e| e.to_string())
            }
            CommandType::RoomInfo => to_json(&room.get_room_info()),
            CommandType::DeviceInfo { name } => match room.get_device_info(name) {
                Some(info) => to_json(&info),
                None => Err(format!("no device named '{}'", name)),
            },
            CommandType::BusInfo => to_json(&room.get_bus_info()),
            CommandType::WorldInfo => to_json(&room.get_world_info()),
            CommandType::Pause => {
                room.pause();
                Ok("simulation paused".to_string())
            }
            CommandType::Resume => {
                room.resume();
                Ok("simulation resumed".to_string())
            }
            CommandType::SetSpeed { factor } => room
                .world_mut()
                .set_speed_factor(*factor)
                .map(|()| format!("speed factor set to {}", factor))
                .map_err(|e| e.to_string()),
            CommandType::SetWeather { weather } => {
                room.world_mut().set_weather(*weather);
                Ok(format!("weather set to {:?}", weather))
            }
            CommandType::SetPresence { entity, present } => {
                let changed = room.set_presence(entity, *present);
                Ok(match (present, changed) {
                    (true, true) => format!("{} entered the room", entity),
                    (false, true) => format!("{} left the room", entity),
                    _ => format!("presence of {} unchanged", entity),
                })
            }
        };

        match outcome {
            Ok(message) => self.create_response(command.id, ResponseStatus::Success, Some(message)),
            Err(message) => {
                warn!(id = command.id, %message, "command failed");
                self.create_response(command.id, ResponseStatus::Error, Some(message))
            }
        }
    }

    /// Parse, execute and serialize one line of input. Unparseable input
    /// yields an `InvalidCommand` response with id 0; a reply that does not
    /// fit [`MAX_RESPONSE_SIZE`] is replaced by a short `Error` response.
    ///
    /// # Errors
    ///
    /// Only if the response itself cannot be serialized.
    pub fn handle_line(&mut self, line: &str, room: &mut Room) -> Result<String, ProtocolError> {
        let response = match self.parse_command(line) {
            Ok(command) => self.execute(&command, room),
            Err(e) => self.create_response(0, ResponseStatus::InvalidCommand, Some(e.to_string())),
        };
        match self.serialize_response(&response) {
            Ok(json) => Ok(json.to_string()),
            Err(ProtocolError::MessageTooLarge) => {
                warn!(id = response.id, limit = MAX_RESPONSE_SIZE, "response too large, replaced by error");
                let fallback = self.create_response(
                    response.id,
                    ResponseStatus::Error,
                    Some(format!("response exceeds {} bytes", MAX_RESPONSE_SIZE)),
                );
                self.serialize_response(&fallback).map(str::to_string)
            }
            Err(e) => Err(e),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn current_timestamp() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
