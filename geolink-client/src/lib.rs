pub mod annotator;
pub mod gemini;
pub mod render;
pub mod session;
pub mod simulation;
pub mod task;
pub mod telemetry;

pub use annotator::{AnnotateError, GenerateError, StatusAnnotator, TextGenerator};
pub use gemini::{CannedGenerator, GeminiClient, Generator};
pub use session::{Session, SessionState, SharedStore};
pub use simulation::SimulationDriver;
pub use task::ScopedTask;
pub use telemetry::{
    FixedPosition, GeoError, GeoEvent, Geolocation, Subscription, TelemetrySource, TrackReplay,
    WatchHandle, WatchOptions,
};
