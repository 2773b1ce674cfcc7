use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::error::Result;

pub const TRACK_PARAM: &str = "track";
pub const SHARE_TITLE: &str = "GeoLink";
pub const COPIED_NOTICE: &str = "Link copied to clipboard!";
pub const COPY_FAILED_NOTICE: &str = "Could not copy the link.";

pub fn pending_invite(entry_url: &str) -> Result<Option<String>> {
    let url = Url::parse(entry_url)?;
    let id = url
        .query_pairs()
        .find(|(key, _)| key == TRACK_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareContent {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl ShareContent {
    // Replaces any previous `track` value and keeps the other parameters.
    pub fn for_profile(page_url: &str, local_id: &str) -> Result<Self> {
        let mut url = Url::parse(page_url)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != TRACK_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(TRACK_PARAM, local_id);
        Ok(Self {
            title: SHARE_TITLE.to_string(),
            text: format!("Track my location on GeoLink! My ID: {local_id}"),
            url: url.to_string(),
        })
    }

    pub fn clipboard_text(&self) -> String {
        format!("{}\n{}", self.text, self.url)
    }
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct ShareError(pub String);

pub trait ShareSheet {
    fn share(&mut self, content: &ShareContent) -> std::result::Result<(), ShareError>;
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> std::result::Result<(), ShareError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Copied,
    Failed,
}

impl ShareOutcome {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ShareOutcome::Shared => None,
            ShareOutcome::Copied => Some(COPIED_NOTICE),
            ShareOutcome::Failed => Some(COPY_FAILED_NOTICE),
        }
    }
}

pub fn deliver(
    content: &ShareContent,
    sheet: Option<&mut dyn ShareSheet>,
    clipboard: &mut dyn Clipboard,
) -> ShareOutcome {
    if let Some(sheet) = sheet {
        match sheet.share(content) {
            Ok(()) => return ShareOutcome::Shared,
            Err(err) => warn!("share sheet failed, falling back to clipboard: {err}"),
        }
    }
    match clipboard.write_text(&content.clipboard_text()) {
        Ok(()) => {
            info!(url = %content.url, "share link copied");
            ShareOutcome::Copied
        }
        Err(err) => {
            warn!("clipboard write failed: {err}");
            ShareOutcome::Failed
        }
    }
}
