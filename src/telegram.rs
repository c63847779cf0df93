use crate::address::{GroupAddress, IndividualAddress};
use serde::{Deserialize, Serialize};

/// Closed set of values a telegram can carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Binary(bool),
    /// `ratio` is a percentage, 0-100.
    Dimmer { on: bool, ratio: u8 },
    /// Requested power in watts. Receivers clamp it to their own range.
    HeaterPower(f64),
}

/// One addressed message on the bus.
///
/// `control_field = true` marks a write/command telegram; read/status
/// telegrams (`false`) are carried but not interpreted by receivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telegram {
    control_field: bool,
    source: IndividualAddress,
    destination: GroupAddress,
    payload: Payload,
}

impl Telegram {
    pub fn new(
        control_field: bool,
        source: IndividualAddress,
        destination: GroupAddress,
        payload: Payload,
    ) -> Self {
        Self {
            control_field,
            source,
            destination,
            payload,
        }
    }

    /// Shorthand for a write telegram.
    pub fn write(source: IndividualAddress, destination: GroupAddress, payload: Payload) -> Self {
        Self::new(true, source, destination, payload)
    }

    pub fn control_field(&self) -> bool {
        self.control_field
    }

    pub fn is_write(&self) -> bool {
        self.control_field
    }

    pub fn source(&self) -> IndividualAddress {
        self.source
    }

    pub fn destination(&self) -> GroupAddress {
        self.destination
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }
}

impl core::fmt::Display for Telegram {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kind = if self.control_field { "write" } else { "read" };
        write!(
            f,
            "{} -> {} [{}] {:?}",
            self.source, self.destination, kind, self.payload
        )
    }
}
