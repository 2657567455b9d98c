use std::sync::Arc;

use concert_core::repository::{CatalogRepository, ReservationRepository, UserRepository};
use concert_shared::Notification;
use concert_store::app_config::{AuthConfig, BusinessRules, Config};
use concert_store::{DbClient, MemoryStore, StoreCatalogRepository, StoreReservationRepository, StoreUserRepository};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogRepository>,
    pub users: Arc<dyn UserRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub notifications: broadcast::Sender<Notification>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        users: Arc<dyn UserRepository>,
        reservations: Arc<dyn ReservationRepository>,
        config: &Config,
    ) -> Self {
        let (notifications, _) = broadcast::channel(config.notifications.channel_capacity.max(1));
        Self {
            catalog,
            users,
            reservations,
            notifications,
            auth: config.auth.clone(),
            business_rules: config.business_rules.clone(),
        }
    }

    pub fn postgres(db: &DbClient, config: &Config) -> Self {
        Self::new(
            Arc::new(StoreCatalogRepository::new(db.pool.clone())),
            Arc::new(StoreUserRepository::new(db.pool.clone())),
            Arc::new(StoreReservationRepository::new(db.pool.clone())),
            config,
        )
    }

    pub fn in_memory(store: Arc<MemoryStore>, config: &Config) -> Self {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.auth.admin_usernames.iter().any(|admin| admin == username)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.auth.token_ttl_seconds as i64)
    }

    pub fn reservation_hold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.business_rules.reservation_hold_seconds as i64)
    }

    /// Sends to current subscribers. Having none is not an error.
    pub fn publish(&self, notification: Notification) {
        let event = notification.event_name();
        match self.notifications.send(notification) {
            Ok(receivers) => tracing::debug!("Published {} to {} subscribers", event, receivers),
            Err(_) => tracing::debug!("Published {} with no subscribers", event),
        }
    }
}
