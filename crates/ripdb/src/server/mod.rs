//! HTTP and WebSocket surface.
//!
//! | Route | |
//! |---|---|
//! | `POST /set/:key` | store the JSON body, reply `{duration, key, data, storedAt}` |
//! | `GET /get/:key` | the wrapped value, or 404 `Not Found` |
//! | `POST /purge/:key` | delete the key, reply `{status}` |
//! | `GET /chat/history?stream=&after=` | stream entries after an id |
//! | `GET /ws` | one relay connection per socket |

mod routes;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ripdb_core::Ed25519Verifier;
use ripdb_relay::{MemoryBroker, Relay};
use ripdb_store::{KeyValueStore, MemoryStore, SqliteStore, StreamStore};

use crate::config::ServerConfig;
use crate::error::Result;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Backing store of `/set`, `/get` and `/purge`.
    pub values: Arc<dyn KeyValueStore>,
    /// Backing store of `/chat/history`; also the relay's stream store.
    pub streams: Arc<dyn StreamStore>,
    /// The message relay.
    pub relay: Relay,
}

impl AppState {
    /// Assemble the state from explicit collaborators.
    pub fn new(values: Arc<dyn KeyValueStore>, streams: Arc<dyn StreamStore>, relay: Relay) -> Self {
        Self {
            values,
            streams,
            relay,
        }
    }

    /// Open storage and build a relay as `config` describes.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let (values, streams) = match &config.database {
            Some(path) => {
                info!(path = %path.display(), "opening sqlite store");
                let store = Arc::new(SqliteStore::open(path)?);
                (store.clone() as Arc<dyn KeyValueStore>, store as Arc<dyn StreamStore>)
            }
            None => {
                info!("using in-memory store");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn KeyValueStore>, store as Arc<dyn StreamStore>)
            }
        };

        let relay = Relay::new(
            streams.clone(),
            Arc::new(MemoryBroker::new()),
            Arc::new(Ed25519Verifier),
            config.relay_config(),
        );
        Ok(Self::new(values, streams, relay))
    }
}

/// The application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/set/:key", post(routes::set))
        .route("/get/:key", get(routes::get))
        .route("/purge/:key", post(routes::purge))
        .route("/chat/history", get(routes::history))
        .route("/ws", get(ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
