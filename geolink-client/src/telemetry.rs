use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use geolink_core::{Coordinates, TelemetryConfig};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::task::ScopedTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    // Zero means always fresh.
    pub maximum_age: Duration,
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout: Duration::from_millis(5_000),
        }
    }
}

impl From<&TelemetryConfig> for WatchOptions {
    fn from(cfg: &TelemetryConfig) -> Self {
        Self {
            high_accuracy: cfg.high_accuracy,
            maximum_age: Duration::from_millis(cfg.maximum_age_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeoError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("no position within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoEvent {
    Fix(Coordinates),
    Error(GeoError),
}

pub trait Geolocation: Send + Sync {
    fn watch_position(
        &self,
        options: WatchOptions,
        events: mpsc::UnboundedSender<GeoEvent>,
    ) -> WatchHandle;
}

pub struct WatchHandle {
    _task: Option<ScopedTask>,
}

impl WatchHandle {
    pub fn from_task(task: ScopedTask) -> Self {
        Self { _task: Some(task) }
    }

    pub fn detached() -> Self {
        Self { _task: None }
    }
}

pub struct FixedPosition {
    position: Coordinates,
    interval: Duration,
}

impl FixedPosition {
    pub fn new(position: Coordinates, interval: Duration) -> Self {
        Self { position, interval }
    }
}

impl Geolocation for FixedPosition {
    fn watch_position(
        &self,
        _options: WatchOptions,
        events: mpsc::UnboundedSender<GeoEvent>,
    ) -> WatchHandle {
        let position = self.position;
        let period = self.interval;
        WatchHandle::from_task(ScopedTask::spawn("geo-fixed", async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if events.send(GeoEvent::Fix(position)).is_err() {
                    break;
                }
            }
        }))
    }
}

pub struct TrackReplay {
    samples: Arc<Vec<Result<Coordinates, String>>>,
    interval: Duration,
}

impl TrackReplay {
    pub fn new(samples: Vec<Result<Coordinates, String>>, interval: Duration) -> Self {
        Self {
            samples: Arc::new(samples),
            interval,
        }
    }

    // Bad lines replay as PositionUnavailable errors.
    pub fn load<P: AsRef<Path>>(path: P, interval: Duration) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut samples = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Coordinates>(&line) {
                Ok(c) => samples.push(Ok(c)),
                Err(err) => samples.push(Err(format!("track line {}: {err}", idx + 1))),
            }
        }
        Ok(Self::new(samples, interval))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Geolocation for TrackReplay {
    fn watch_position(
        &self,
        options: WatchOptions,
        events: mpsc::UnboundedSender<GeoEvent>,
    ) -> WatchHandle {
        let samples = Arc::clone(&self.samples);
        let period = self.interval;
        WatchHandle::from_task(ScopedTask::spawn("geo-replay", async move {
            let mut idx = 0usize;
            let mut first = true;
            loop {
                let event = if samples.is_empty() {
                    time::sleep(options.timeout).await;
                    GeoEvent::Error(GeoError::Timeout(options.timeout))
                } else if period > options.timeout {
                    time::sleep(options.timeout).await;
                    if events
                        .send(GeoEvent::Error(GeoError::Timeout(options.timeout)))
                        .is_err()
                    {
                        break;
                    }
                    time::sleep(period - options.timeout).await;
                    replay_event(&samples[idx])
                } else {
                    if !first {
                        time::sleep(period).await;
                    }
                    replay_event(&samples[idx])
                };
                first = false;
                if events.send(event).is_err() {
                    break;
                }
                if !samples.is_empty() {
                    idx = (idx + 1) % samples.len();
                }
            }
        }))
    }
}

fn replay_event(sample: &Result<Coordinates, String>) -> GeoEvent {
    match sample {
        Ok(c) => GeoEvent::Fix(*c),
        Err(msg) => GeoEvent::Error(GeoError::PositionUnavailable(msg.clone())),
    }
}

pub struct Subscription {
    _watch: WatchHandle,
    pump: ScopedTask,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        !self.pump.is_finished()
    }
}

pub struct TelemetrySource {
    provider: Arc<dyn Geolocation>,
    options: WatchOptions,
}

impl TelemetrySource {
    pub fn new(provider: Arc<dyn Geolocation>, options: WatchOptions) -> Self {
        Self { provider, options }
    }

    pub fn options(&self) -> WatchOptions {
        self.options
    }

    pub fn start_watching<F, E>(&self, mut on_sample: F, mut on_error: E) -> Subscription
    where
        F: FnMut(Coordinates) + Send + 'static,
        E: FnMut(&GeoError) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = self.provider.watch_position(self.options, tx);
        debug!(
            high_accuracy = self.options.high_accuracy,
            timeout_ms = self.options.timeout.as_millis() as u64,
            "geolocation watch started"
        );
        let pump = ScopedTask::spawn("telemetry-pump", async move {
            while let Some(event) = rx.recv().await {
                match event {
                    GeoEvent::Fix(coords) => on_sample(coords),
                    GeoEvent::Error(err) => on_error(&err),
                }
            }
        });
        Subscription {
            _watch: watch,
            pump,
        }
    }

    pub fn stop(&self, subscription: Subscription) {
        drop(subscription);
        debug!("geolocation watch stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(lat: f64) -> Coordinates {
        Coordinates::new(lat, 0.0)
    }

    #[tokio::test(start_paused = true)]
    async fn replay_loops_and_reports_bad_lines() {
        let replay = TrackReplay::new(
            vec![Ok(at(1.0)), Err("garbled".into()), Ok(at(3.0))],
            Duration::from_millis(100),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watch = replay.watch_position(WatchOptions::default(), tx);

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(rx.recv().await.unwrap());
        }
        assert_eq!(events[0], GeoEvent::Fix(at(1.0)));
        assert!(matches!(
            events[1],
            GeoEvent::Error(GeoError::PositionUnavailable(_))
        ));
        assert_eq!(events[2], GeoEvent::Fix(at(3.0)));
        assert_eq!(events[3], GeoEvent::Fix(at(1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_keeps_cadence_across_the_wrap() {
        let replay = TrackReplay::new(vec![Ok(at(1.0)), Ok(at(2.0))], Duration::from_millis(100));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = time::Instant::now();
        let _watch = replay.watch_position(WatchOptions::default(), tx);

        let mut arrivals = Vec::new();
        for _ in 0..4 {
            rx.recv().await.unwrap();
            arrivals.push(start.elapsed().as_millis());
        }
        assert_eq!(arrivals, vec![0, 100, 200, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn single_sample_track_emits_once_per_period() {
        let replay = TrackReplay::new(vec![Ok(at(1.0))], Duration::from_millis(1_000));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = replay.watch_position(WatchOptions::default(), tx);

        time::sleep(Duration::from_millis(3_500)).await;
        drop(watch);
        let mut seen = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event, GeoEvent::Fix(at(1.0)));
            seen += 1;
        }
        assert_eq!(seen, 4);
        time::sleep(Duration::from_millis(5_000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_replay_reports_timeouts() {
        let replay = TrackReplay::new(vec![Ok(at(1.0))], Duration::from_millis(8_000));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watch = replay.watch_position(WatchOptions::default(), tx);
        assert_eq!(
            rx.recv().await.unwrap(),
            GeoEvent::Error(GeoError::Timeout(Duration::from_millis(5_000)))
        );
        assert_eq!(rx.recv().await.unwrap(), GeoEvent::Fix(at(1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn callbacks_receive_fixes_and_errors_until_stopped() {
        let fixes = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));
        let source = TelemetrySource::new(
            Arc::new(TrackReplay::new(
                vec![Ok(at(1.0)), Err("bad".into())],
                Duration::from_millis(100),
            )),
            WatchOptions::default(),
        );
        let sub = source.start_watching(
            {
                let fixes = fixes.clone();
                move |c| fixes.lock().push(c)
            },
            {
                let errors = errors.clone();
                move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                }
            },
        );
        time::sleep(Duration::from_millis(350)).await;
        assert!(sub.is_active());
        source.stop(sub);

        let seen = fixes.lock().len();
        assert!(seen >= 2);
        assert!(errors.load(Ordering::SeqCst) >= 1);
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fixes.lock().len(), seen);
    }

    #[test]
    fn options_follow_config() {
        let cfg = TelemetryConfig {
            timeout_ms: 2_500,
            ..TelemetryConfig::default()
        };
        let opts = WatchOptions::from(&cfg);
        assert!(opts.high_accuracy);
        assert_eq!(opts.maximum_age, Duration::ZERO);
        assert_eq!(opts.timeout, Duration::from_millis(2_500));
        assert_eq!(WatchOptions::default().timeout, Duration::from_secs(5));
    }
}
