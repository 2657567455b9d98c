// Per-test server bootstrapping: each test gets its own in-memory catalog.
use std::sync::Arc;

use axum::{extract::Path, http::StatusCode, routing::get, Router};
use concert_client::{ClientConfig, ConcertClient};
use concert_store::app_config::{AuthConfig, BusinessRules, Config, DatabaseConfig, NotificationConfig, ServerConfig};
use concert_store::MemoryStore;

pub const IMAGE_BYTES: &[u8] = b"\x89PNG fake image";

pub fn test_config(hold_seconds: u64, token_ttl_seconds: u64) -> Config {
    Config {
        server: ServerConfig { port: 0 },
        database: DatabaseConfig::default(),
        auth: AuthConfig {
            token_ttl_seconds,
            password_pepper: "client-test-pepper".to_string(),
            admin_usernames: vec!["admin".to_string()],
        },
        business_rules: BusinessRules {
            reservation_hold_seconds: hold_seconds,
            purge_interval_seconds: 60,
        },
        notifications: NotificationConfig::default(),
    }
}

// Bind an ephemeral port first so the URL is valid before the server task runs.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    format!("http://{}", addr)
}

pub async fn spawn_service(config: Config) -> String {
    let state = concert_api::AppState::in_memory(Arc::new(MemoryStore::with_sample_catalog()), &config);
    serve(concert_api::app(state)).await
}

// Stands in for the image bucket: only the first sample performer's image exists.
pub async fn spawn_image_host() -> String {
    let router = Router::new().route(
        "/{name}",
        get(|Path(name): Path<String>| async move {
            if name == "aurora_lights.jpg" {
                Ok(IMAGE_BYTES)
            } else {
                Err(StatusCode::NOT_FOUND)
            }
        }),
    );
    serve(router).await
}

pub async fn client_for(config: Config) -> ConcertClient {
    let base_url = spawn_service(config).await;
    let images = spawn_image_host().await;
    ConcertClient::new(ClientConfig::new(base_url).with_images_base_url(images)).expect("client builds")
}
