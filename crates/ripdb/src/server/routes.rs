//! Key-value and history routes.

use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ripdb_core::{ChannelId, MessageId};
use ripdb_store::{StreamEntry, Wrapped};

use super::AppState;
use crate::error::{Result, RipError};

/// A response body annotated with how long the store took, in ms.
#[derive(Debug, Serialize)]
pub(crate) struct Timed<T> {
    duration: u64,
    #[serde(flatten)]
    body: T,
}

impl<T> Timed<T> {
    fn since(start: Instant, body: T) -> Self {
        Self {
            duration: saturating_millis(start.elapsed()),
            body,
        }
    }
}

fn saturating_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) async fn set(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Timed<Wrapped<Value>>>> {
    let start = Instant::now();
    let wrapped = state.values.set(&key, value).await?;
    Ok(Json(Timed::since(start, wrapped)))
}

pub(crate) async fn get(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Timed<Wrapped<Value>>>> {
    let start = Instant::now();
    let wrapped = state.values.get(&key).await?;
    Ok(Json(Timed::since(start, wrapped)))
}

#[derive(Debug, Serialize)]
pub(crate) struct PurgeStatus {
    status: &'static str,
}

pub(crate) async fn purge(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PurgeStatus>> {
    let status = if state.values.purge(&key).await? {
        "purged"
    } else {
        "absent"
    };
    Ok(Json(PurgeStatus { status }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryQuery {
    stream: String,
    after: Option<String>,
}

impl HistoryQuery {
    /// `-` or nothing means the start of the stream.
    fn after(&self) -> Result<Option<MessageId>> {
        match self.after.as_deref() {
            None | Some("-") => Ok(None),
            Some(id) => id
                .parse()
                .map(Some)
                .map_err(|_| RipError::BadRequest(format!("invalid message id: {id}"))),
        }
    }
}

pub(crate) async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<StreamEntry>>> {
    let after = query.after()?;
    let stream = ChannelId::named(query.stream);
    Ok(Json(state.streams.range(&stream, after).await?))
}
