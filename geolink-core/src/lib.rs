use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod config;
pub mod entity;
pub mod error;
pub mod geo;
pub mod invite;
pub mod projection;
pub mod reconcile;
pub mod simulation;
pub mod status;
pub mod store;

pub use config::{Config, GeneratorConfig, TelemetryConfig};
pub use entity::{login, Contact, Entity, Presence};
pub use error::{GeoLinkError, Result};
pub use geo::{CompassDirection, Coordinates, LatLng};
pub use projection::{project, Projection, ProjectionMode, RadarPoint, RadarProjector};
pub use reconcile::{MapView, MarkerPayload, MarkerReconciler, MarkerSurface, ReconcileStats};
pub use status::{StatusRequest, FALLBACK_STATUS};
pub use store::{AddOutcome, EntityStore, Snapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub ts_unix_ms: i64,
    #[serde(flatten)]
    pub snapshot: Snapshot,
}

impl SnapshotRecord {
    pub fn now(snapshot: Snapshot) -> Self {
        Self {
            ts_unix_ms: now_unix_ms(),
            snapshot,
        }
    }
}

pub fn now_unix_ms() -> i64 {
    let dur = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (dur.as_secs() as i64) * 1000 + (dur.subsec_millis() as i64)
}
