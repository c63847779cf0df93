use crate::device::Location;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

const WALL_TOLERANCE_M: f64 = 1e-6;

/// Interior size of a room, in metres. The room spans `[0, width]` on x,
/// `[0, length]` on y and `[0, height]` on z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomDimensions {
    width: f64,
    length: f64,
    height: f64,
}

impl RoomDimensions {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDimensions` unless all sides are positive
    /// and finite.
    pub fn new(width: f64, length: f64, height: f64) -> Result<Self, ConfigError> {
        let valid = [width, length, height]
            .iter()
            .all(|side| side.is_finite() && *side > 0.0);
        if !valid {
            return Err(ConfigError::InvalidDimensions { width, length, height });
        }
        Ok(Self { width, length, height })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn contains(&self, location: &Location) -> bool {
        (0.0..=self.width).contains(&location.x)
            && (0.0..=self.length).contains(&location.y)
            && (0.0..=self.height).contains(&location.z)
    }

    /// The wall `location` sits on, if any.
    pub fn wall_of(&self, location: &Location) -> Option<Wall> {
        if !self.contains(location) {
            return None;
        }
        let near = |a: f64, b: f64| (a - b).abs() <= WALL_TOLERANCE_M;
        if near(location.x, 0.0) {
            Some(Wall::West)
        } else if near(location.x, self.width) {
            Some(Wall::East)
        } else if near(location.y, 0.0) {
            Some(Wall::South)
        } else if near(location.y, self.length) {
            Some(Wall::North)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wall {
    /// `x = 0`
    West,
    /// `x = width`
    East,
    /// `y = 0`
    South,
    /// `y = length`
    North,
}

/// A rectangular opening in a wall, centred on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallOpening {
    pub wall: Wall,
    pub center: Location,
    pub width: f64,
    pub height: f64,
}

impl WallOpening {
    /// Point of the opening closest to `target`.
    pub fn nearest_point(&self, target: &Location) -> Location {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let z = target.z.clamp(self.center.z - half_h, self.center.z + half_h);
        match self.wall {
            Wall::West | Wall::East => Location::new(
                self.center.x,
                target.y.clamp(self.center.y - half_w, self.center.y + half_w),
                z,
            ),
            Wall::South | Wall::North => Location::new(
                target.x.clamp(self.center.x - half_w, self.center.x + half_w),
                self.center.y,
                z,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimensions() {
        assert!(RoomDimensions::new(0.0, 4.0, 2.5).is_err());
        assert!(RoomDimensions::new(5.0, f64::NAN, 2.5).is_err());
    }

    #[test]
    fn test_wall_detection() {
        let room = RoomDimensions::new(5.0, 4.0, 2.5).unwrap();
        assert_eq!(room.wall_of(&Location::new(0.0, 2.0, 1.0)), Some(Wall::West));
        assert_eq!(room.wall_of(&Location::new(5.0, 2.0, 1.0)), Some(Wall::East));
        assert_eq!(room.wall_of(&Location::new(2.0, 4.0, 1.0)), Some(Wall::North));
        assert_eq!(room.wall_of(&Location::new(2.0, 2.0, 1.0)), None);
    }

    #[test]
    fn test_nearest_point_clamps_to_opening() {
        let opening = WallOpening {
            wall: Wall::West,
            center: Location::new(0.0, 2.0, 1.5),
            width: 1.0,
            height: 1.0,
        };
        let p = opening.nearest_point(&Location::new(3.0, 4.0, 0.0));
        assert_eq!(p, Location::new(0.0, 2.5, 1.0));
        let p = opening.nearest_point(&Location::new(3.0, 2.2, 1.2));
        assert_eq!(p, Location::new(0.0, 2.2, 1.2));
    }
}
