//! Per-video like tracking.
//!
//! A [`LikeSet`] is the only place a like is recorded. The public like count
//! is read from the set's cardinality, so the two can never drift apart. The
//! set itself knows nothing about locking; [`crate::store::VideoStore`] holds
//! its write lock around every mutation.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{VideoError, VideoResult};

/// Users that currently like one video. Serialized as a sorted JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LikeSet {
    users: BTreeSet<String>,
}

impl LikeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `user` from not-liked to liked. Liking twice is rejected and
    /// leaves the set untouched.
    pub fn like(&mut self, video_id: u64, user: &str) -> VideoResult<()> {
        if self.users.contains(user) {
            return Err(VideoError::invalid(format!(
                "You cannot like the video with id {video_id} twice"
            )));
        }
        self.users.insert(user.to_owned());
        Ok(())
    }

    /// Moves `user` from liked back to not-liked. Covers both "never liked"
    /// and "already unliked" with the same rejection.
    pub fn unlike(&mut self, video_id: u64, user: &str) -> VideoResult<()> {
        if !self.users.remove(user) {
            return Err(VideoError::invalid(format!(
                "You cannot unlike the video with id {video_id}"
            )));
        }
        Ok(())
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn count(&self) -> u64 {
        self.users.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }
}
