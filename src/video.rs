//! Records exchanged with clients.
//!
//! [`NewVideo`] is what a client posts; [`Video`] is what the store keeps and
//! hands back. Fields the server owns (`dataUrl`, `likes`, `usersWhoLiked`)
//! only exist on [`Video`], so a client echoing a previous response back at
//! `POST /video` cannot smuggle them in.

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

use crate::likes::LikeSet;

/// Body of `POST /video`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    /// `0` (or absent) asks the store to assign an id.
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    /// Length in seconds.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl NewVideo {
    pub fn new(title: impl Into<String>, duration: u64) -> Self {
        Self {
            title: title.into(),
            duration,
            ..Self::default()
        }
    }
}

/// A stored video record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: u64,
    pub title: String,
    pub duration: u64,
    pub subject: Option<String>,
    pub location: Option<String>,
    pub content_type: Option<String>,
    pub data_url: String,
    pub(crate) likers: LikeSet,
}

impl Video {
    pub(crate) fn from_new(id: u64, new: NewVideo, base_url: &str) -> Self {
        Self {
            id,
            title: new.title,
            duration: new.duration,
            subject: new.subject,
            location: new.location,
            content_type: new.content_type,
            data_url: data_url(base_url, id),
            likers: LikeSet::new(),
        }
    }

    /// Number of distinct users currently liking this video.
    pub fn likes(&self) -> u64 {
        self.likers.count()
    }

    pub fn likers(&self) -> &LikeSet {
        &self.likers
    }
}

impl Serialize for Video {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Video", 9)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("duration", &self.duration)?;
        for (key, value) in [
            ("subject", &self.subject),
            ("location", &self.location),
            ("contentType", &self.content_type),
        ] {
            match value {
                Some(value) => state.serialize_field(key, value)?,
                None => state.skip_field(key)?,
            }
        }
        state.serialize_field("dataUrl", &self.data_url)?;
        state.serialize_field("likes", &self.likes())?;
        state.serialize_field("usersWhoLiked", &self.likers)?;
        state.end()
    }
}

/// Builds the download/upload location for `id` under `base_url`.
pub fn data_url(base_url: &str, id: u64) -> String {
    format!("{}/video/{id}/data", base_url.trim_end_matches('/'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoState {
    Processing,
    Ready,
}

/// Returned by `POST /video/{id}/data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatus {
    pub state: VideoState,
}

impl VideoStatus {
    pub fn ready() -> Self {
        Self {
            state: VideoState::Ready,
        }
    }
}
