use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{
    invite_contact_name, manual_contact_name, Contact, Entity, Presence, INVITE_CONTACT_STATUS,
    MANUAL_CONTACT_STATUS, MOCK_AVATARS,
};
use crate::geo::Coordinates;
use crate::now_unix_ms;
use crate::simulation::jitter_near;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    RejectedSelfId,
    RejectedEmptyId,
    AwaitingFix,
}

impl AddOutcome {
    pub fn is_added(self) -> bool {
        self == AddOutcome::Added
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub local: Presence,
    pub contacts: Vec<Contact>,
}

impl Snapshot {
    pub fn entities(&self) -> impl Iterator<Item = Entity<'_>> {
        std::iter::once(Entity::Local(&self.local)).chain(self.contacts.iter().map(Entity::Contact))
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.presence.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct EntityStore {
    local: Presence,
    contacts: Vec<Contact>,
    next_generation: u64,
}

impl EntityStore {
    pub fn new(local: Presence) -> Self {
        Self {
            local,
            contacts: Vec::new(),
            next_generation: 1,
        }
    }

    pub fn local(&self) -> &Presence {
        &self.local
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.presence.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.local.id == id || self.contact(id).is_some()
    }

    pub fn set_local_coordinates(&mut self, coords: Coordinates) {
        self.local.location = Some(coords);
        self.local.last_updated_ms = now_unix_ms();
    }

    pub fn add_contact(&mut self, mut candidate: Contact) -> AddOutcome {
        let id = candidate.presence.id.as_str();
        if id.trim().is_empty() {
            return AddOutcome::RejectedEmptyId;
        }
        if id == self.local.id {
            debug!(id, "ignoring contact with the local id");
            return AddOutcome::RejectedSelfId;
        }
        if self.contact(id).is_some() {
            debug!(id, "contact already tracked");
            return AddOutcome::AlreadyPresent;
        }
        candidate.generation = self.next_generation;
        self.next_generation += 1;
        self.contacts.push(candidate);
        AddOutcome::Added
    }

    pub fn add_manual_contact<R: Rng>(&mut self, input: &str, rng: &mut R) -> AddOutcome {
        let id = input.trim();
        if id.is_empty() {
            return AddOutcome::RejectedEmptyId;
        }
        let avatar = MOCK_AVATARS[self.contacts.len() % MOCK_AVATARS.len()];
        let location = self.local.location.map(|base| jitter_near(&base, rng));
        let contact = Contact::new(id, manual_contact_name(id), avatar)
            .with_location(location)
            .with_status(MANUAL_CONTACT_STATUS);
        self.add_contact(contact)
    }

    pub fn accept_invite<R: Rng>(&mut self, id: &str, rng: &mut R) -> AddOutcome {
        let Some(base) = self.local.location else {
            return AddOutcome::AwaitingFix;
        };
        let avatar = MOCK_AVATARS.choose(rng).copied().unwrap_or(MOCK_AVATARS[0]);
        let contact = Contact::new(id, invite_contact_name(id), avatar)
            .with_location(Some(jitter_near(&base, rng)))
            .with_status(INVITE_CONTACT_STATUS);
        self.add_contact(contact)
    }

    pub fn remove_contact(&mut self, id: &str) -> Option<Contact> {
        let idx = self.contacts.iter().position(|c| c.presence.id == id)?;
        Some(self.contacts.remove(idx))
    }

    pub fn update_contact_status(&mut self, id: &str, text: &str) -> bool {
        match self.contacts.iter_mut().find(|c| c.presence.id == id) {
            Some(contact) => {
                contact.status_message = text.to_string();
                true
            }
            None => false,
        }
    }

    // Writes only into the contact instance with this generation.
    pub fn update_contact_status_for(&mut self, id: &str, generation: u64, text: &str) -> bool {
        match self
            .contacts
            .iter_mut()
            .find(|c| c.presence.id == id && c.generation == generation)
        {
            Some(contact) => {
                contact.status_message = text.to_string();
                true
            }
            None => false,
        }
    }

    pub fn tick_simulation<R: Rng>(&mut self, rng: &mut R) -> usize {
        let Some(origin) = self.local.location else {
            return 0;
        };
        let now = now_unix_ms();
        for contact in &mut self.contacts {
            let base = contact.presence.location.unwrap_or(origin);
            contact.presence.location = Some(jitter_near(&base, rng));
            contact.presence.last_updated_ms = now;
        }
        self.contacts.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            local: self.local.clone(),
            contacts: self.contacts.clone(),
        }
    }
}
