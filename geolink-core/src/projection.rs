use serde::{Deserialize, Serialize};

use crate::geo::{Coordinates, LatLng};

pub const DEFAULT_RADAR_SCALE_DEG: f64 = 0.01;
pub const RADAR_CENTER: f64 = 50.0;
pub const RADAR_HALF_SPAN: f64 = 50.0;
pub const RADAR_MAX_RADIUS: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMode {
    Radar,
    Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarPoint {
    pub x: f64,
    pub y: f64,
}

impl RadarPoint {
    pub const CENTER: RadarPoint = RadarPoint {
        x: RADAR_CENTER,
        y: RADAR_CENTER,
    };

    pub fn radius(&self) -> f64 {
        (self.x - RADAR_CENTER).hypot(self.y - RADAR_CENTER)
    }

    pub fn bearing(&self) -> f64 {
        (self.y - RADAR_CENTER).atan2(self.x - RADAR_CENTER)
    }

    pub fn is_center(&self) -> bool {
        *self == RadarPoint::CENTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Radar(RadarPoint),
    Map(LatLng),
    Unplaced,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarProjector {
    pub scale_deg: f64,
}

impl Default for RadarProjector {
    fn default() -> Self {
        Self {
            scale_deg: DEFAULT_RADAR_SCALE_DEG,
        }
    }
}

impl RadarProjector {
    pub fn new(scale_deg: f64) -> Self {
        Self { scale_deg }
    }

    pub fn project(
        &self,
        origin: Option<&Coordinates>,
        target: Option<&Coordinates>,
    ) -> RadarPoint {
        let (Some(origin), Some(target)) = (origin, target) else {
            return RadarPoint::CENTER;
        };
        let unclamped = self.unclamped(origin, target);
        clamp_to_disk(unclamped)
    }

    pub fn unclamped(&self, origin: &Coordinates, target: &Coordinates) -> RadarPoint {
        let d_lat = target.latitude - origin.latitude;
        let d_lng = target.longitude - origin.longitude;
        RadarPoint {
            x: RADAR_CENTER + (d_lng / self.scale_deg) * RADAR_HALF_SPAN,
            y: RADAR_CENTER - (d_lat / self.scale_deg) * RADAR_HALF_SPAN,
        }
    }
}

pub fn clamp_to_disk(point: RadarPoint) -> RadarPoint {
    let dx = point.x - RADAR_CENTER;
    let dy = point.y - RADAR_CENTER;
    if dx.hypot(dy) <= RADAR_MAX_RADIUS {
        return point;
    }
    let angle = dy.atan2(dx);
    RadarPoint {
        x: RADAR_CENTER + angle.cos() * RADAR_MAX_RADIUS,
        y: RADAR_CENTER + angle.sin() * RADAR_MAX_RADIUS,
    }
}

pub fn project(
    origin: Option<&Coordinates>,
    target: Option<&Coordinates>,
    mode: ProjectionMode,
) -> Projection {
    match mode {
        ProjectionMode::Radar => {
            Projection::Radar(RadarProjector::default().project(origin, target))
        }
        ProjectionMode::Map => match target {
            Some(t) => Projection::Map(t.lat_lng()),
            None => Projection::Unplaced,
        },
    }
}
