use rand::Rng;

use crate::geo::Coordinates;

pub const DEFAULT_SIMULATION_INTERVAL_MS: u64 = 3_000;

pub const JITTER_DEG: f64 = 0.0025;
pub const SIMULATED_ACCURACY_M: f64 = 10.0;
pub const MAX_SIMULATED_SPEED_MS: f64 = 60.0;

pub fn jitter_near<R: Rng>(base: &Coordinates, rng: &mut R) -> Coordinates {
    Coordinates {
        latitude: base.latitude + rng.gen_range(-JITTER_DEG..JITTER_DEG),
        longitude: base.longitude + rng.gen_range(-JITTER_DEG..JITTER_DEG),
        accuracy: SIMULATED_ACCURACY_M,
        heading: Some(rng.gen_range(0.0..360.0)),
        speed: Some(rng.gen_range(0.0..MAX_SIMULATED_SPEED_MS)),
    }
}
