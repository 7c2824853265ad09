//! Shared application state: the installed race store, degraded-mode flag,
//! per-room broadcast hubs, and the loaded configuration.

pub mod lifecycle;
pub mod rooms;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::race_store::RaceStore, error::ServiceError};

pub use self::lifecycle::{InvalidTransition, RaceEvent, RaceStatus};
pub use self::rooms::RoomChannels;

/// Cheaply clonable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Per-room broadcast channel capacity; slow SSE consumers past this lag skip events.
const ROOM_CHANNEL_CAPACITY: usize = 32;

/// Central application state shared by every request handler.
pub struct AppState {
    race_store: RwLock<Option<Arc<dyn RaceStore>>>,
    rooms: RoomChannels,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            race_store: RwLock::new(None),
            rooms: RoomChannels::new(ROOM_CHANNEL_CAPACITY),
            degraded: degraded_tx,
            config,
        })
    }

    /// Obtain a handle to the current race store, if one is installed.
    pub async fn race_store(&self) -> Option<Arc<dyn RaceStore>> {
        let guard = self.race_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the race store or fail with a degraded-mode error.
    pub async fn require_race_store(&self) -> Result<Arc<dyn RaceStore>, ServiceError> {
        self.race_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new race store implementation and leave degraded mode.
    pub async fn set_race_store(&self, store: Arc<dyn RaceStore>) {
        {
            let mut guard = self.race_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current race store and enter degraded mode.
    pub async fn clear_race_store(&self) {
        {
            let mut guard = self.race_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Registry of per-room broadcast hubs used by the SSE streams.
    pub fn rooms(&self) -> &RoomChannels {
        &self.rooms
    }

    /// Loaded application configuration, including the sentence corpus.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
