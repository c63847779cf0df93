use thiserror::Error;

/// Errors raised while building a room: bad addresses, bad devices, bad
/// placement. These reject the offending step and leave the room unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid individual address {area}.{line}.{device} (area/line 0-15, device 0-255)")]
    InvalidIndividualAddress { area: u16, line: u16, device: u16 },

    #[error("invalid group address '{text}': {reason}")]
    InvalidGroupAddress { text: String, reason: &'static str },

    #[error("group address {address} does not use the room's {expected} style")]
    StyleMismatch { address: String, expected: &'static str },

    #[error("invalid room name '{0}'")]
    InvalidRoomName(String),

    #[error("invalid room dimensions {width}x{length}x{height}")]
    InvalidDimensions { width: f64, length: f64, height: f64 },

    #[error("invalid device name '{0}'")]
    InvalidDeviceName(String),

    #[error("device name '{0}' already used in this room")]
    DuplicateName(String),

    #[error("individual address {0} already used in this room")]
    DuplicateAddress(String),

    #[error("device '{name}' placed outside the room at ({x}, {y}, {z})")]
    OutOfRoom { name: String, x: f64, y: f64, z: f64 },

    #[error("window '{0}' must be placed on a wall")]
    WindowNotOnWall(String),

    #[error("invalid device parameters for '{name}': {reason}")]
    InvalidDevice { name: String, reason: &'static str },

    #[error("device '{0}' has no free group address slot")]
    TooManyBindings(String),

    #[error("no device named '{0}' in this room")]
    UnknownDevice(String),

    #[error("invalid simulation config: {0}")]
    InvalidConfig(&'static str),
}

/// A single actuator failing to apply a telegram. Dispatch logs it and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceFault {
    #[error("actuator '{0}' is disabled")]
    Disabled(String),

    #[error("actuator '{name}' received a non-finite power request ({power})")]
    NonFinitePower { name: String, power: f64 },
}

/// Numeric trouble inside one ambient step; the step is skipped for that tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmbientError {
    #[error("saturation vapor pressure undefined at {0} °C")]
    VaporPressureDomain(f64),

    #[error("{quantity} update produced a non-finite value")]
    NonFinite { quantity: &'static str },
}

/// Errors surfaced to the command interface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("no device named '{0}'")]
    UnknownDevice(String),

    #[error("device '{0}' is not a functional module")]
    NotFunctionalModule(String),

    #[error("ratio {0} out of range 0-100")]
    InvalidRatio(u8),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid JSON")]
    InvalidJson,

    #[error("message too large")]
    MessageTooLarge,

    #[error("serialization error")]
    SerializationError,
}
