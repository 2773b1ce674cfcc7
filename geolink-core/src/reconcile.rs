use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::entity::Entity;
use crate::geo::LatLng;
use crate::store::Snapshot;

pub const LOCAL_LABEL: &str = "YOU";
pub const LOCAL_ACCENT: &str = "#3b82f6";
pub const CONTACT_ACCENT: &str = "#22c55e";
pub const NO_STATUS: &str = "No status";

pub const TILE_URL: &str = "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png";
pub const TILE_SUBDOMAINS: &str = "abcd";
pub const TILE_MAX_ZOOM: u8 = 20;
pub const INITIAL_ZOOM: u8 = 15;
pub const RECENTER_ZOOM: u8 = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPayload {
    pub label: String,
    pub avatar: String,
    pub accent: &'static str,
    pub popup: Option<String>,
}

impl MarkerPayload {
    pub fn for_entity(entity: &Entity<'_>) -> Self {
        match entity {
            Entity::Local(p) => MarkerPayload {
                label: LOCAL_LABEL.to_string(),
                avatar: p.avatar.clone(),
                accent: LOCAL_ACCENT,
                popup: None,
            },
            Entity::Contact(c) => {
                let status = if c.status_message.is_empty() {
                    NO_STATUS
                } else {
                    c.status_message.as_str()
                };
                MarkerPayload {
                    label: c.presence.name.clone(),
                    avatar: c.presence.avatar.clone(),
                    accent: CONTACT_ACCENT,
                    popup: Some(format!("{}: {}", c.presence.name, status)),
                }
            }
        }
    }
}

pub trait MarkerSurface {
    type Handle;

    fn create(&mut self, id: &str, at: LatLng, payload: &MarkerPayload) -> Self::Handle;
    fn update(&mut self, handle: &mut Self::Handle, at: LatLng, payload: &MarkerPayload);
    fn remove(&mut self, handle: Self::Handle);
    fn set_view(&mut self, center: LatLng, zoom: u8);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub skipped: usize,
}

pub struct MarkerReconciler<H> {
    markers: HashMap<String, H>,
}

impl<H> Default for MarkerReconciler<H> {
    fn default() -> Self {
        Self {
            markers: HashMap::new(),
        }
    }
}

impl<H> MarkerReconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn handle(&self, id: &str) -> Option<&H> {
        self.markers.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(String::as_str)
    }

    pub fn reconcile<S>(&mut self, surface: &mut S, snapshot: &Snapshot) -> ReconcileStats
    where
        S: MarkerSurface<Handle = H>,
    {
        let mut stats = ReconcileStats::default();
        let current: HashSet<&str> = snapshot.entities().map(|e| e.id()).collect();

        let stale: Vec<String> = self
            .markers
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if let Some(handle) = self.markers.remove(&id) {
                surface.remove(handle);
                stats.removed += 1;
                trace!(id = %id, "marker removed");
            }
        }

        for entity in snapshot.entities() {
            let Some(location) = entity.location() else {
                stats.skipped += 1;
                continue;
            };
            let at = location.lat_lng();
            let payload = MarkerPayload::for_entity(&entity);
            match self.markers.get_mut(entity.id()) {
                Some(handle) => {
                    surface.update(handle, at, &payload);
                    stats.updated += 1;
                }
                None => {
                    let handle = surface.create(entity.id(), at, &payload);
                    self.markers.insert(entity.id().to_string(), handle);
                    stats.created += 1;
                    trace!(id = entity.id(), "marker created");
                }
            }
        }
        stats
    }

    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: MarkerSurface<Handle = H>,
    {
        for (_, handle) in self.markers.drain() {
            surface.remove(handle);
        }
    }
}

pub struct MapView<S: MarkerSurface> {
    surface: S,
    markers: MarkerReconciler<S::Handle>,
    initialized: bool,
    local_fix: Option<LatLng>,
}

impl<S: MarkerSurface> MapView<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            markers: MarkerReconciler::new(),
            initialized: false,
            local_fix: None,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn markers(&self) -> &MarkerReconciler<S::Handle> {
        &self.markers
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn sync(&mut self, snapshot: &Snapshot) -> Option<ReconcileStats> {
        let local = snapshot.local.location?.lat_lng();
        self.local_fix = Some(local);
        if !self.initialized {
            self.surface.set_view(local, INITIAL_ZOOM);
            self.initialized = true;
        }
        Some(self.markers.reconcile(&mut self.surface, snapshot))
    }

    pub fn recenter(&mut self) -> bool {
        match (self.initialized, self.local_fix) {
            (true, Some(local)) => {
                self.surface.set_view(local, RECENTER_ZOOM);
                true
            }
            _ => false,
        }
    }

    pub fn teardown(mut self) -> S {
        self.markers.clear(&mut self.surface);
        self.surface
    }
}
