//! Bounded FIFO collection of saved locations.
//!
//! The whole collection is stored as one JSON value under [`FAVORITES_KEY`]
//! and is re-read on every call, so writes from another process show up
//! immediately. Mutations are read-modify-write without locking across
//! processes; concurrent writers lose updates (last writer wins).

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::storage::{KeyValueStore, StorageError};
use crate::types::{AddOutcome, Coordinate, FavoriteEntry};

pub const FAVORITES_KEY: &str = "weather_favorites";
pub const FAVORITES_CAPACITY: usize = 6;

/// Last collection this process saw or wrote.
///
/// Persistence is best effort: when a write fails the mirror stays
/// authoritative until a later write succeeds.
#[derive(Debug, Default)]
struct Mirror {
    entries: Vec<FavoriteEntry>,
    unsaved: bool,
}

pub struct FavoritesCache<S: KeyValueStore> {
    store: S,
    mirror: Mutex<Mirror>,
}

impl<S: KeyValueStore> FavoritesCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            mirror: Mutex::new(Mirror::default()),
        }
    }

    /// Add a location, replacing any entry at (nearly) the same coordinate.
    ///
    /// When the collection is full the oldest entry by `created_at` is
    /// evicted and returned in the outcome.
    pub fn add(
        &self,
        location_name: &str,
        display_title: &str,
        coordinate: Coordinate,
    ) -> AddOutcome {
        let mut items = self.load();

        if let Some(index) = items
            .iter()
            .position(|item| item.coordinate.is_near(&coordinate))
        {
            let previous = items.remove(index);
            tracing::debug!("Re-adding favorite {} as newest", previous.id);
        }

        let mut evicted = None;
        while items.len() >= FAVORITES_CAPACITY {
            let Some(oldest) = oldest_index(&items) else {
                break;
            };
            let removed = items.remove(oldest);
            tracing::info!("Evicting oldest favorite {} ({})", removed.id, removed.display_title);
            if evicted.is_none() {
                evicted = Some(removed);
            }
        }

        let added = FavoriteEntry {
            id: Uuid::new_v4().to_string(),
            original_location_name: location_name.to_string(),
            display_title: display_title.to_string(),
            coordinate,
            created_at: Utc::now(),
        };
        items.push(added.clone());
        self.persist(items);

        AddOutcome { added, evicted }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut items = self.load();
        let before = items.len();
        items.retain(|item| item.id != id);

        if items.len() == before {
            return false;
        }
        self.persist(items);
        true
    }

    /// Rename an entry. Recency and eviction order are unchanged.
    pub fn update_title(&self, id: &str, new_title: &str) -> bool {
        let mut items = self.load();
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        item.display_title = new_title.to_string();
        self.persist(items);
        true
    }

    pub fn is_favorite(&self, coordinate: &Coordinate) -> bool {
        self.load()
            .iter()
            .any(|item| item.coordinate.is_near(coordinate))
    }

    pub fn id_for(&self, coordinate: &Coordinate) -> Option<String> {
        self.load()
            .into_iter()
            .find(|item| item.coordinate.is_near(coordinate))
            .map(|item| item.id)
    }

    pub fn count(&self) -> usize {
        self.load().len()
    }

    /// Entries in stored order (insertion order, not sorted by recency).
    pub fn all(&self) -> Vec<FavoriteEntry> {
        self.load()
    }

    fn load(&self) -> Vec<FavoriteEntry> {
        let mut mirror = self.mirror.lock();
        if mirror.unsaved {
            return mirror.entries.clone();
        }

        let parsed: Result<Vec<FavoriteEntry>, StorageError> =
            self.store.get(FAVORITES_KEY).and_then(|raw| match raw {
                Some(raw) => serde_json::from_str(&raw).map_err(StorageError::from),
                None => Ok(Vec::new()),
            });

        match parsed {
            Ok(items) => {
                mirror.entries.clone_from(&items);
                items
            }
            Err(e) => {
                tracing::warn!("Failed to load favorites, using last known list: {}", e);
                mirror.entries.clone()
            }
        }
    }

    fn persist(&self, items: Vec<FavoriteEntry>) {
        let result = serde_json::to_string(&items)
            .map_err(StorageError::from)
            .and_then(|raw| self.store.set(FAVORITES_KEY, &raw));

        let mut mirror = self.mirror.lock();
        mirror.unsaved = match result {
            Ok(()) => false,
            Err(e) => {
                tracing::warn!("Failed to save favorites: {}", e);
                true
            }
        };
        mirror.entries = items;
    }
}

/// Index of the oldest entry; ties go to the earliest position.
fn oldest_index(items: &[FavoriteEntry]) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .min_by_key(|(index, item)| (item.created_at, *index))
        .map(|(index, _)| index)
}
