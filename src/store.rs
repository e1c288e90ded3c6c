//! In-memory video store.
//!
//! One `RwLock` guards both the records and the id counter. Lookups share the
//! lock; inserts and like/unlike take it exclusively, so id assignment never
//! hands out a duplicate and a like check can't race its own mutation. The
//! guard is never held across an `.await`.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{VideoError, VideoResult};
use crate::video::{NewVideo, Video};

#[derive(Debug, Default)]
struct Inner {
    /// Last id handed out by the counter. Ids claimed by clients don't move
    /// it; the counter steps over them when it gets there.
    last_id: u64,
    videos: BTreeMap<u64, Video>,
}

impl Inner {
    fn next_id(&mut self) -> VideoResult<u64> {
        loop {
            self.last_id = self
                .last_id
                .checked_add(1)
                .ok_or_else(|| VideoError::invalid("No video ids left to assign"))?;
            if !self.videos.contains_key(&self.last_id) {
                return Ok(self.last_id);
            }
        }
    }

    fn get_mut(&mut self, id: u64) -> VideoResult<&mut Video> {
        self.videos.get_mut(&id).ok_or(VideoError::NotFound(id))
    }
}

/// Owns every video record for the lifetime of the process.
#[derive(Debug, Default)]
pub struct VideoStore {
    inner: RwLock<Inner>,
}

impl VideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `new` and returns the stored record.
    ///
    /// An id of `0` gets the next unused id. A non-zero id is accepted when
    /// free; reusing a taken id is rejected since records have no metadata
    /// update path.
    pub fn add(&self, new: NewVideo, base_url: &str) -> VideoResult<Video> {
        let mut inner = self.inner.write();
        let id = match new.id {
            0 => inner.next_id()?,
            id if inner.videos.contains_key(&id) => {
                return Err(VideoError::invalid(format!(
                    "Video with id {id} already exists"
                )));
            }
            id => id,
        };

        let video = Video::from_new(id, new, base_url);
        inner.videos.insert(id, video.clone());
        info!(video_id = id, title = %video.title, "video added");
        Ok(video)
    }

    pub fn get(&self, id: u64) -> VideoResult<Video> {
        self.inner
            .read()
            .videos
            .get(&id)
            .cloned()
            .ok_or(VideoError::NotFound(id))
    }

    /// Every record in ascending id order.
    pub fn list(&self) -> Vec<Video> {
        self.inner.read().videos.values().cloned().collect()
    }

    pub fn find_by_title(&self, title: &str) -> Vec<Video> {
        self.filter(|video| video.title == title)
    }

    /// Records strictly shorter than `duration`.
    pub fn find_by_duration_less_than(&self, duration: u64) -> Vec<Video> {
        self.filter(|video| video.duration < duration)
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<Video>
    where
        F: Fn(&Video) -> bool,
    {
        self.inner
            .read()
            .videos
            .values()
            .filter(|video| predicate(video))
            .cloned()
            .collect()
    }

    pub fn like(&self, id: u64, user: &str) -> VideoResult<Video> {
        let mut inner = self.inner.write();
        let video = inner.get_mut(id)?;
        video.likers.like(id, user)?;
        debug!(video_id = id, user, likes = video.likes(), "video liked");
        Ok(video.clone())
    }

    pub fn unlike(&self, id: u64, user: &str) -> VideoResult<Video> {
        let mut inner = self.inner.write();
        let video = inner.get_mut(id)?;
        video.likers.unlike(id, user)?;
        debug!(video_id = id, user, likes = video.likes(), "video unliked");
        Ok(video.clone())
    }

    pub fn likers(&self, id: u64) -> VideoResult<BTreeSet<String>> {
        self.inner
            .read()
            .videos
            .get(&id)
            .map(|video| video.likers.users().clone())
            .ok_or(VideoError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.inner.read().videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().videos.is_empty()
    }
}
