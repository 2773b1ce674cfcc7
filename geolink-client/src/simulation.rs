use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use crate::session::SharedStore;
use crate::task::ScopedTask;

#[derive(Debug, Clone, Copy)]
pub struct SimulationDriver {
    interval: Duration,
}

impl SimulationDriver {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // The first move lands one full interval after the fix.
    pub fn spawn(&self, store: SharedStore, mut has_fix: watch::Receiver<bool>) -> ScopedTask {
        let period = self.interval;
        ScopedTask::spawn("simulation", async move {
            let ready = has_fix.wait_for(|fix| *fix).await.is_ok();
            if !ready {
                return;
            }
            debug!(interval_ms = period.as_millis() as u64, "simulation running");
            let mut rng = StdRng::from_entropy();
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let moved = store.lock().tick_simulation(&mut rng);
                trace!(moved, "simulation tick");
            }
        })
    }
}
