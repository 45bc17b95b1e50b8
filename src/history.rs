//! Append-only log of resolved alarm episodes.
//!
//! Insertion order is resolution order.  Nothing is ever removed or edited;
//! bounding the list for display is the presentation layer's business.

use serde::Serialize;

use crate::fsm::AlarmEpisode;

#[derive(Debug, Clone, Default)]
pub struct AlarmHistory {
    episodes: Vec<AlarmEpisode>,
}

impl AlarmHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolved episode.
    pub fn append(&mut self, episode: AlarmEpisode) {
        debug_assert!(episode.is_resolved(), "only resolved episodes are archived");
        self.episodes.push(episode);
    }

    /// Oldest first.
    pub fn all(&self) -> &[AlarmEpisode] {
        &self.episodes
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &AlarmEpisode> {
        self.episodes.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Display rows, newest first.
    pub fn items(&self) -> Vec<HistoryItem> {
        self.newest_first().map(HistoryItem::from).collect()
    }
}

/// One row of the commute history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub location: String,
    /// e.g. `17 April 2025`
    pub date: String,
    /// e.g. `08:15`
    pub time: String,
}

impl From<&AlarmEpisode> for HistoryItem {
    fn from(e: &AlarmEpisode) -> Self {
        let at = e.resolved_at.unwrap_or(e.armed_at);
        Self {
            id: e.id.to_string(),
            location: e.destination.address.clone(),
            date: at.format("%-d %B %Y").to_string(),
            time: at.format("%H:%M").to_string(),
        }
    }
}
