pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const MS_PER_HOUR: f64 = 3_600_000.0;
pub const MS_PER_SEC: f64 = 1_000.0;

// Consecutive fixes closer than this count as the same position.
pub const DEFAULT_MIN_MOVE_M: f64 = 0.5;

pub const DEFAULT_RADAR_SCALE_DEG: f64 = geolink_core::projection::DEFAULT_RADAR_SCALE_DEG;
