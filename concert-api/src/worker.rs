use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use concert_core::repository::ReservationRepository;
use tracing::{debug, error, info};

/// Periodically deletes unconfirmed reservations whose hold has lapsed.
///
/// Expired holds already stop blocking seats the moment they lapse; this only
/// keeps the table from growing.
pub async fn start_purge_worker(reservations: Arc<dyn ReservationRepository>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!("Reservation purge worker started, running every {:?}", every);

    loop {
        ticker.tick().await;
        match reservations.purge_expired(Utc::now()).await {
            Ok(0) => debug!("No expired reservations to purge"),
            Ok(purged) => info!("Purged {} expired reservations", purged),
            Err(e) => error!("Failed to purge expired reservations: {}", e),
        }
    }
}
