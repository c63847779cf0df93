//! KNX addressing.
//!
//! Devices are identified on the bus by an [`IndividualAddress`]
//! (`area.line.device`) and exchange telegrams through [`GroupAddress`]es,
//! which come in three interchangeable encodings:
//!
//! - free: `main` (0-65535)
//! - 2-level: `main/sub` (0-31 / 0-2047)
//! - 3-level: `main/middle/sub` (0-31 / 0-7 / 0-255)
//!
//! Both kinds are packed into 16 bits. Group addresses also carry their
//! encoding, so `1/2/3` and the free address with the same raw value are
//! never equal.

use crate::error::ConfigError;
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

/// Bus identity of a device: `area.line.device`.
///
/// Packed as 4 bits area, 4 bits line, 8 bits device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndividualAddress {
    raw: u16,
}

impl IndividualAddress {
    pub const MAX_AREA: u16 = 15;
    pub const MAX_LINE: u16 = 15;
    pub const MAX_DEVICE: u16 = 255;

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidIndividualAddress` if any field is out of range.
    pub fn new(area: u16, line: u16, device: u16) -> Result<Self, ConfigError> {
        if area > Self::MAX_AREA || line > Self::MAX_LINE || device > Self::MAX_DEVICE {
            return Err(ConfigError::InvalidIndividualAddress { area, line, device });
        }
        Ok(Self {
            raw: (area << 12) | (line << 8) | device,
        })
    }

    pub const fn raw(self) -> u16 {
        self.raw
    }

    pub const fn area(self) -> u16 {
        self.raw >> 12
    }

    pub const fn line(self) -> u16 {
        (self.raw >> 8) & 0x0F
    }

    pub const fn device(self) -> u16 {
        self.raw & 0xFF
    }
}

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.area(), self.line(), self.device())
    }
}

impl FromStr for IndividualAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidIndividualAddress {
            area: u16::MAX,
            line: u16::MAX,
            device: u16::MAX,
        };
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u16, ConfigError> {
            parts
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .ok_or_else(invalid)
        };
        let (area, line, device) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::new(area, line, device)
    }
}

/// Encoding of a group address. A room picks one for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupAddressStyle {
    Free,
    TwoLevel,
    ThreeLevel,
}

impl GroupAddressStyle {
    pub const fn name(self) -> &'static str {
        match self {
            GroupAddressStyle::Free => "free",
            GroupAddressStyle::TwoLevel => "2-level",
            GroupAddressStyle::ThreeLevel => "3-level",
        }
    }

    const fn levels(self) -> usize {
        match self {
            GroupAddressStyle::Free => 1,
            GroupAddressStyle::TwoLevel => 2,
            GroupAddressStyle::ThreeLevel => 3,
        }
    }
}

impl fmt::Display for GroupAddressStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing key shared by zero or more devices.
///
/// Fields are packed without overlap:
/// - 3-level: `main << 11 | middle << 8 | sub`
/// - 2-level: `main << 11 | sub`
/// - free: `main`
///
/// Ordering compares the style first, then the packed value. Only addresses
/// of the same style are meaningfully ordered.
///
/// ```
/// use knxsim::address::{GroupAddress, GroupAddressStyle};
///
/// let ga = GroupAddress::parse("1/2/3", GroupAddressStyle::ThreeLevel).unwrap();
/// assert_eq!(ga.to_string(), "1/2/3");
/// assert_eq!(ga.raw(), 0x0A03);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupAddress {
    style: GroupAddressStyle,
    raw: u16,
}

impl GroupAddress {
    pub const MAX_FREE: u32 = 65_535;
    pub const MAX_MAIN: u32 = 31;
    pub const MAX_MIDDLE: u32 = 7;
    pub const MAX_SUB: u32 = 255;
    pub const MAX_SUB_TWO_LEVEL: u32 = 2047;

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGroupAddress` if `main` exceeds 65535.
    pub fn free(main: u32) -> Result<Self, ConfigError> {
        let main = check(main, Self::MAX_FREE, "free address must be 0-65535")?;
        Ok(Self {
            style: GroupAddressStyle::Free,
            raw: main,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGroupAddress` if `main > 31` or `sub > 2047`.
    pub fn two_level(main: u32, sub: u32) -> Result<Self, ConfigError> {
        let main = check(main, Self::MAX_MAIN, "main group must be 0-31")?;
        let sub = check(sub, Self::MAX_SUB_TWO_LEVEL, "sub group must be 0-2047")?;
        Ok(Self {
            style: GroupAddressStyle::TwoLevel,
            raw: (main << 11) | sub,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGroupAddress` if `main > 31`, `middle > 7`
    /// or `sub > 255`.
    pub fn three_level(main: u32, middle: u32, sub: u32) -> Result<Self, ConfigError> {
        let main = check(main, Self::MAX_MAIN, "main group must be 0-31")?;
        let middle = check(middle, Self::MAX_MIDDLE, "middle group must be 0-7")?;
        let sub = check(sub, Self::MAX_SUB, "sub group must be 0-255")?;
        Ok(Self {
            style: GroupAddressStyle::ThreeLevel,
            raw: (main << 11) | (middle << 8) | sub,
        })
    }

    /// Parse `text` using the given style. The number of `/`-separated parts
    /// must match the style exactly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidGroupAddress` on bad syntax or bounds.
    pub fn parse(text: &str, style: GroupAddressStyle) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidGroupAddress {
            text: text.to_string(),
            reason,
        };

        let parts = text
            .trim()
            .split('/')
            .map(|p| p.parse::<u32>().map_err(|_| invalid("not a number")))
            .collect::<Result<Vec<_>, _>>()?;

        if parts.len() != style.levels() {
            return Err(invalid(match style {
                GroupAddressStyle::Free => "expected a free address like '1234'",
                GroupAddressStyle::TwoLevel => "expected a 2-level address like '1/234'",
                GroupAddressStyle::ThreeLevel => "expected a 3-level address like '1/2/3'",
            }));
        }

        let parsed = match style {
            GroupAddressStyle::Free => Self::free(parts[0]),
            GroupAddressStyle::TwoLevel => Self::two_level(parts[0], parts[1]),
            GroupAddressStyle::ThreeLevel => Self::three_level(parts[0], parts[1], parts[2]),
        };
        parsed.map_err(|e| match e {
            ConfigError::InvalidGroupAddress { reason, .. } => invalid(reason),
            other => other,
        })
    }

    pub const fn style(self) -> GroupAddressStyle {
        self.style
    }

    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Main group. For free addresses this is the whole value.
    pub const fn main(self) -> u16 {
        match self.style {
            GroupAddressStyle::Free => self.raw,
            GroupAddressStyle::TwoLevel | GroupAddressStyle::ThreeLevel => self.raw >> 11,
        }
    }

    /// Middle group, only present for 3-level addresses.
    pub const fn middle(self) -> Option<u16> {
        match self.style {
            GroupAddressStyle::ThreeLevel => Some((self.raw >> 8) & 0x07),
            _ => None,
        }
    }

    /// Sub group, absent for free addresses.
    pub const fn sub(self) -> Option<u16> {
        match self.style {
            GroupAddressStyle::Free => None,
            GroupAddressStyle::TwoLevel => Some(self.raw & 0x07FF),
            GroupAddressStyle::ThreeLevel => Some(self.raw & 0xFF),
        }
    }
}

// Packed fields must fit their bit ranges.
const_assert!(GroupAddress::MAX_MAIN < (1 << 5));
const_assert!(GroupAddress::MAX_MIDDLE < (1 << 3));
const_assert!(GroupAddress::MAX_SUB < (1 << 8));
const_assert!(GroupAddress::MAX_SUB_TWO_LEVEL < (1 << 11));

fn check(value: u32, max: u32, reason: &'static str) -> Result<u16, ConfigError> {
    if value > max {
        return Err(ConfigError::InvalidGroupAddress {
            text: value.to_string(),
            reason,
        });
    }
    // max never exceeds u16::MAX
    Ok(value as u16)
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.middle(), self.sub()) {
            (Some(middle), Some(sub)) => write!(f, "{}/{}/{}", self.main(), middle, sub),
            (None, Some(sub)) => write!(f, "{}/{}", self.main(), sub),
            _ => write!(f, "{}", self.main()),
        }
    }
}
