use std::sync::Arc;

use geolink_core::invite::{self, Clipboard, ShareContent, ShareOutcome, ShareSheet};
use geolink_core::{login, AddOutcome, Coordinates, EntityStore, GeoLinkError, Snapshot};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::annotator::{StatusAnnotator, TextGenerator};
use crate::simulation::SimulationDriver;
use crate::task::ScopedTask;
use crate::telemetry::{Subscription, TelemetrySource};

pub type SharedStore = Arc<Mutex<EntityStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    SignedOut,
    Active,
}

struct Active<T> {
    store: SharedStore,
    annotator: StatusAnnotator<T>,
    subscription: Subscription,
    _simulation: ScopedTask,
}

pub struct Session<T> {
    telemetry: TelemetrySource,
    simulation: SimulationDriver,
    generator: Arc<T>,
    page_url: String,
    pending_invite: Arc<Mutex<Option<String>>>,
    active: Option<Active<T>>,
}

impl<T: TextGenerator> Session<T> {
    pub fn new(
        telemetry: TelemetrySource,
        simulation: SimulationDriver,
        generator: Arc<T>,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            telemetry,
            simulation,
            generator,
            page_url: page_url.into(),
            pending_invite: Arc::new(Mutex::new(None)),
            active: None,
        }
    }

    pub fn open_entry_url(&mut self, entry_url: &str) -> Result<Option<String>, GeoLinkError> {
        let pending = invite::pending_invite(entry_url)?;
        if let Some(id) = &pending {
            info!(id = %id, "pending invite queued");
        }
        *self.pending_invite.lock() = pending.clone();
        Ok(pending)
    }

    pub fn pending_invite(&self) -> Option<String> {
        self.pending_invite.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Active
        } else {
            SessionState::SignedOut
        }
    }

    pub fn begin(&mut self, username: &str) -> Result<SharedStore, GeoLinkError> {
        if let Some(active) = &self.active {
            warn!("session already active; login ignored");
            return Ok(Arc::clone(&active.store));
        }
        let local = login(username, &mut rand::thread_rng())?;
        info!(id = %local.id, name = %local.name, "session started");
        let store: SharedStore = Arc::new(Mutex::new(EntityStore::new(local)));

        let (fix_tx, fix_rx) = watch::channel(false);
        let on_sample = {
            let store = Arc::clone(&store);
            let pending = Arc::clone(&self.pending_invite);
            move |coords: Coordinates| {
                let mut guard = store.lock();
                guard.set_local_coordinates(coords);
                if let Some(id) = pending.lock().take() {
                    let outcome = guard.accept_invite(&id, &mut rand::thread_rng());
                    info!(id = %id, ?outcome, "pending invite resolved");
                }
                drop(guard);
                fix_tx.send_replace(true);
            }
        };
        let subscription = self
            .telemetry
            .start_watching(on_sample, |err| warn!("geolocation: {err}"));
        let simulation = self.simulation.spawn(Arc::clone(&store), fix_rx);
        let annotator = StatusAnnotator::new(Arc::clone(&self.generator), Arc::clone(&store));

        self.active = Some(Active {
            store: Arc::clone(&store),
            annotator,
            subscription,
            _simulation: simulation,
        });
        Ok(store)
    }

    pub fn end(&mut self) {
        if let Some(active) = self.active.take() {
            self.telemetry.stop(active.subscription);
            info!("session ended");
        }
    }

    pub fn store(&self) -> Option<SharedStore> {
        self.active.as_ref().map(|a| Arc::clone(&a.store))
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.active.as_ref().map(|a| a.store.lock().snapshot())
    }

    pub fn annotator(&self) -> Option<StatusAnnotator<T>> {
        self.active.as_ref().map(|a| a.annotator.clone())
    }

    pub fn is_watching(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.subscription.is_active())
    }

    pub fn add_contact(&self, input: &str) -> Option<AddOutcome> {
        let active = self.active.as_ref()?;
        let outcome = active
            .store
            .lock()
            .add_manual_contact(input, &mut rand::thread_rng());
        info!(input = input.trim(), ?outcome, "add contact");
        Some(outcome)
    }

    pub fn share_content(&self) -> Option<Result<ShareContent, GeoLinkError>> {
        let active = self.active.as_ref()?;
        let local_id = active.store.lock().local().id.clone();
        Some(ShareContent::for_profile(&self.page_url, &local_id))
    }

    pub fn share(
        &self,
        sheet: Option<&mut dyn ShareSheet>,
        clipboard: &mut dyn Clipboard,
    ) -> Option<ShareOutcome> {
        let outcome = match self.share_content()? {
            Ok(content) => invite::deliver(&content, sheet, clipboard),
            Err(err) => {
                warn!("cannot build share link: {err}");
                ShareOutcome::Failed
            }
        };
        Some(outcome)
    }
}
