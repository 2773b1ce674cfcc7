use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GeoLinkError, Result};
use crate::geo::Coordinates;
use crate::now_unix_ms;

pub const MOCK_AVATARS: [&str; 3] = [
    "https://picsum.photos/100/100?random=1",
    "https://picsum.photos/100/100?random=2",
    "https://picsum.photos/100/100?random=3",
];

pub const MANUAL_CONTACT_STATUS: &str = "Connected. Waiting for signal...";
pub const INVITE_CONTACT_STATUS: &str = "Connected via invite link.";

const LOCAL_ID_RANGE: u32 = 10_000;
const SHORT_LABEL_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub last_updated_ms: i64,
    #[serde(default)]
    pub location: Option<Coordinates>,
}

impl Presence {
    pub fn has_fix(&self) -> bool {
        self.location.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(flatten)]
    pub presence: Presence,
    #[serde(default)]
    pub status_message: String,
    pub tracking: bool,
    // Assigned by the store on insert; a re-added id gets a new generation.
    #[serde(default)]
    pub generation: u64,
}

impl Contact {
    pub fn new(id: impl Into<String>, name: impl Into<String>, avatar: impl Into<String>) -> Self {
        Self {
            presence: Presence {
                id: id.into(),
                name: name.into(),
                avatar: avatar.into(),
                last_updated_ms: now_unix_ms(),
                location: None,
            },
            status_message: String::new(),
            tracking: true,
            generation: 0,
        }
    }

    pub fn with_location(mut self, location: Option<Coordinates>) -> Self {
        self.presence.location = location;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status_message = status.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.presence.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entity<'a> {
    Local(&'a Presence),
    Contact(&'a Contact),
}

impl<'a> Entity<'a> {
    pub fn presence(&self) -> &'a Presence {
        match *self {
            Entity::Local(p) => p,
            Entity::Contact(c) => &c.presence,
        }
    }

    pub fn id(&self) -> &'a str {
        &self.presence().id
    }

    pub fn location(&self) -> Option<&'a Coordinates> {
        self.presence().location.as_ref()
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Entity::Local(_))
    }
}

pub fn login<R: Rng>(username: &str, rng: &mut R) -> Result<Presence> {
    let name = username.trim();
    if name.is_empty() {
        return Err(GeoLinkError::EmptyUsername);
    }
    let id = format!("USR-{}", rng.gen_range(0..LOCAL_ID_RANGE));
    let avatar = url::Url::parse_with_params(
        "https://ui-avatars.com/api/",
        &[("name", name), ("background", "random")],
    )?
    .to_string();
    Ok(Presence {
        id,
        name: name.to_string(),
        avatar,
        last_updated_ms: now_unix_ms(),
        location: None,
    })
}

pub fn short_label(id: &str) -> String {
    id.chars().take(SHORT_LABEL_CHARS).collect()
}

pub fn manual_contact_name(id: &str) -> String {
    format!("Friend {}", short_label(id))
}

pub fn invite_contact_name(id: &str) -> String {
    format!("Guest {}", short_label(id))
}
