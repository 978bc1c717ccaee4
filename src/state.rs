use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::FeedStore;
use crate::images::ImageStore;
use crate::realtime::EventBus;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn FeedStore>,
    pub images: ImageStore,
    pub events: EventBus,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn FeedStore>) -> Self {
        let images = ImageStore::new(config.server.images_dir.clone());
        let events = EventBus::new(config.api.event_channel_capacity);
        Self {
            config: Arc::new(config),
            store,
            images,
            events,
        }
    }
}
