//! Accelerometer readings

use serde::{Deserialize, Serialize};

/// One 3-axis reading in raw sensor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccelerationSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AccelerationSample {
    /// Create a sample from raw axis values.
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }
}

impl From<(i16, i16, i16)> for AccelerationSample {
    fn from((x, y, z): (i16, i16, i16)) -> Self {
        Self { x, y, z }
    }
}
