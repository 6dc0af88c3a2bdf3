use std::sync::Arc;

use actix_web::{web, Scope};

use super::webhooks;
use crate::{
    configs::settings::Settings,
    connector::StripeTaxInterface,
    core::errors::ApplicationError,
    db::{CacheInterface, StorageInterface},
    events::{EventDispatcher, WebhookEventRegistry},
};

/// Application state assembled once at process start. Every component
/// receives its collaborators here, as typed parameters; nothing is
/// resolved from a runtime registry.
pub struct AppState {
    pub conf: Settings,
    pub store: Arc<dyn StorageInterface>,
    pub cache: Arc<dyn CacheInterface>,
    pub connector: Arc<dyn StripeTaxInterface>,
    pub webhook_events: WebhookEventRegistry,
    pub host_events: EventDispatcher,
}

impl AppState {
    pub fn new(
        conf: Settings,
        store: Arc<dyn StorageInterface>,
        cache: Arc<dyn CacheInterface>,
        connector: Arc<dyn StripeTaxInterface>,
    ) -> Self {
        Self {
            conf,
            store,
            cache,
            connector,
            webhook_events: WebhookEventRegistry::new(),
            host_events: EventDispatcher::new(),
        }
    }

    /// Startup check that every consumed event has a registered handler.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        self.webhook_events.validate()?;
        self.host_events.validate()
    }
}

pub struct Webhooks;

impl Webhooks {
    pub fn server(state: web::Data<AppState>) -> Scope {
        web::scope("/stripe")
            .app_data(state)
            .route("/webhook", web::post().to(webhooks::receive_incoming_webhook))
    }
}
