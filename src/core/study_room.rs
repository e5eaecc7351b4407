//! Per-user saved notes, videos and uploaded images.
//!
//! Each collection is one JSON array shared by every user of the store; reads
//! filter by user id and writes leave other users' records untouched.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::conversation::Exchange;
use crate::core::storage::{load_json_list, save_json_list, KeyValueStore, StorageError};

pub const NOTES_KEY: &str = "savedResponses";
pub const VIDEOS_KEY: &str = "savedVideos";
pub const IMAGES_KEY: &str = "uploadedImages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedNote {
    pub user_id: String,
    pub query: String,
    pub response: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedVideo {
    pub user_id: String,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub description: String,
    pub timestamp: String,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub user_id: String,
    pub url: String,
    pub timestamp: String,
    pub name: String,
}

/// Video metadata supplied by the caller when saving.
#[derive(Debug, Clone, Default)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub description: String,
}

impl SavedNote {
    /// Whether the query or response contains `term`, ignoring case.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.query.to_lowercase().contains(&needle)
            || self.response.to_lowercase().contains(&needle)
    }
}

trait Owned {
    fn user_id(&self) -> &str;
}

impl Owned for SavedNote {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Owned for SavedVideo {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Owned for UploadedImage {
    fn user_id(&self) -> &str {
        &self.user_id
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub struct StudyRoom<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> StudyRoom<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    fn list_for<T>(&self, key: &str, user_id: &str) -> Result<Vec<T>, StorageError>
    where
        T: Owned + serde::de::DeserializeOwned,
    {
        Ok(load_json_list::<T>(self.store, key)?
            .into_iter()
            .filter(|item| item.user_id() == user_id)
            .collect())
    }

    fn append<T>(&self, key: &str, item: T) -> Result<T, StorageError>
    where
        T: Clone + Serialize + serde::de::DeserializeOwned,
    {
        let mut items: Vec<T> = load_json_list(self.store, key)?;
        items.push(item.clone());
        save_json_list(self.store, key, &items)?;
        Ok(item)
    }

    /// Drop this user's records matching `predicate`. Returns how many were removed.
    fn remove_where<T, F>(&self, key: &str, user_id: &str, predicate: F) -> Result<usize, StorageError>
    where
        T: Owned + Serialize + serde::de::DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let items: Vec<T> = load_json_list(self.store, key)?;
        let before = items.len();
        let kept: Vec<T> = items
            .into_iter()
            .filter(|item| !(item.user_id() == user_id && predicate(item)))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            save_json_list(self.store, key, &kept)?;
        }
        Ok(removed)
    }

    pub fn save_note(&self, user_id: &str, exchange: &Exchange) -> Result<SavedNote, StorageError> {
        let note = SavedNote {
            user_id: user_id.to_string(),
            query: exchange.query.clone(),
            response: exchange.response.clone(),
            timestamp: now_timestamp(),
            image_url: exchange.image_url.clone(),
        };
        info!(user_id, "saving note");
        self.append(NOTES_KEY, note)
    }

    pub fn notes(&self, user_id: &str) -> Result<Vec<SavedNote>, StorageError> {
        self.list_for(NOTES_KEY, user_id)
    }

    /// Notes whose query or response contains `term`, ignoring case.
    pub fn search_notes(&self, user_id: &str, term: &str) -> Result<Vec<SavedNote>, StorageError> {
        Ok(self
            .notes(user_id)?
            .into_iter()
            .filter(|note| note.matches(term))
            .collect())
    }

    /// Timestamps are assumed unique per user; every record sharing `timestamp` is removed.
    pub fn delete_note(&self, user_id: &str, timestamp: &str) -> Result<usize, StorageError> {
        self.remove_where::<SavedNote, _>(NOTES_KEY, user_id, |note| note.timestamp == timestamp)
    }

    pub fn save_video(&self, user_id: &str, video: VideoDetails) -> Result<SavedVideo, StorageError> {
        let now = now_timestamp();
        let saved = SavedVideo {
            user_id: user_id.to_string(),
            id: video.id,
            title: video.title,
            thumbnail: video.thumbnail,
            description: video.description,
            timestamp: now.clone(),
            saved_at: now,
        };
        info!(user_id, video_id = %saved.id, "saving video");
        self.append(VIDEOS_KEY, saved)
    }

    pub fn videos(&self, user_id: &str) -> Result<Vec<SavedVideo>, StorageError> {
        self.list_for(VIDEOS_KEY, user_id)
    }

    pub fn delete_video(&self, user_id: &str, video_id: &str) -> Result<usize, StorageError> {
        self.remove_where::<SavedVideo, _>(VIDEOS_KEY, user_id, |video| video.id == video_id)
    }

    pub fn add_image(&self, user_id: &str, url: &str, name: &str) -> Result<UploadedImage, StorageError> {
        let image = UploadedImage {
            user_id: user_id.to_string(),
            url: url.to_string(),
            timestamp: now_timestamp(),
            name: name.to_string(),
        };
        self.append(IMAGES_KEY, image)
    }

    pub fn images(&self, user_id: &str) -> Result<Vec<UploadedImage>, StorageError> {
        self.list_for(IMAGES_KEY, user_id)
    }

    /// Timestamps are assumed unique per user; every record sharing `timestamp` is removed.
    pub fn delete_image(&self, user_id: &str, timestamp: &str) -> Result<usize, StorageError> {
        self.remove_where::<UploadedImage, _>(IMAGES_KEY, user_id, |image| {
            image.timestamp == timestamp
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::MemoryStore;

    fn exchange(query: &str, response: &str) -> Exchange {
        Exchange {
            query: query.to_string(),
            response: response.to_string(),
            image_url: None,
        }
    }

    #[test]
    fn notes_are_scoped_by_user() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);

        room.save_note("alice", &exchange("What is gravity?", "A force"))
            .unwrap();
        room.save_note("bob", &exchange("What is light?", "A wave"))
            .unwrap();

        let alice = room.notes("alice").unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].query, "What is gravity?");
        assert_eq!(room.notes("bob").unwrap().len(), 1);
        assert!(room.notes("carol").unwrap().is_empty());
    }

    #[test]
    fn note_records_use_the_stored_json_shape() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);
        let mut with_image = exchange("What is this?", "A cat");
        with_image.image_url = Some("https://x/img.png".into());
        room.save_note("alice", &with_image).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&store.get(NOTES_KEY).unwrap().unwrap()).unwrap();
        let record = &raw[0];
        assert_eq!(record["userId"], "alice");
        assert_eq!(record["imageUrl"], "https://x/img.png");
        assert!(record["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn search_matches_query_or_response_case_insensitively() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);
        room.save_note("alice", &exchange("Newton's laws", "Motion and FORCE"))
            .unwrap();
        room.save_note("alice", &exchange("Photosynthesis", "Plants and light"))
            .unwrap();

        let hits = room.search_notes("alice", "force").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query, "Newton's laws");
        assert_eq!(room.search_notes("alice", "PLANTS").unwrap().len(), 1);
        assert_eq!(room.search_notes("alice", "").unwrap().len(), 2);
    }

    #[test]
    fn delete_only_touches_the_owners_records() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);
        let note = room.save_note("alice", &exchange("q", "r")).unwrap();
        let mut foreign = note.clone();
        foreign.user_id = "bob".into();
        let mut all: Vec<SavedNote> = load_json_list(&store, NOTES_KEY).unwrap();
        all.push(foreign);
        save_json_list(&store, NOTES_KEY, &all).unwrap();

        assert_eq!(room.delete_note("alice", &note.timestamp).unwrap(), 1);
        assert!(room.notes("alice").unwrap().is_empty());
        assert_eq!(room.notes("bob").unwrap().len(), 1);
        assert_eq!(room.delete_note("alice", &note.timestamp).unwrap(), 0);
    }

    #[test]
    fn videos_can_be_saved_listed_and_removed() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);
        room.save_video(
            "alice",
            VideoDetails {
                id: "dQw4w9WgXcQ".into(),
                title: "Gravity explained".into(),
                ..Default::default()
            },
        )
        .unwrap();

        let videos = room.videos("alice").unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].title, "Gravity explained");
        assert_eq!(videos[0].timestamp, videos[0].saved_at);

        assert_eq!(room.delete_video("alice", "dQw4w9WgXcQ").unwrap(), 1);
        assert!(room.videos("alice").unwrap().is_empty());
    }

    #[test]
    fn images_can_be_added_and_removed_by_timestamp() {
        let store = MemoryStore::new();
        let room = StudyRoom::new(&store);
        let image = room
            .add_image("alice", "https://cdn/img.png", "diagram.png")
            .unwrap();

        assert_eq!(room.images("alice").unwrap(), vec![image.clone()]);
        assert_eq!(room.delete_image("alice", &image.timestamp).unwrap(), 1);
        assert!(room.images("alice").unwrap().is_empty());
    }
}
