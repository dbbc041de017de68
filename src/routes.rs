use axum::{
    Json,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response, sse::{Event, KeepAlive, Sse}},
};
use bytes::Bytes;
use futures::{future, Stream, StreamExt};
use std::{collections::HashMap, convert::Infallible, sync::Arc};
use parking_lot::RwLock;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    codec,
    controller::Session,
    error::ApiError,
    gemini::GenerationClient,
    models::{PhotoConfig, PhotoStyle},
    view::{self, SessionView},
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<Session>>>>,
    pub generator: Arc<dyn GenerationClient>,
}

impl AppState {
    pub fn new(generator: Arc<dyn GenerationClient>) -> Self {
        Self { sessions: Arc::default(), generator }
    }

    fn session(&self, id: Uuid) -> Result<Arc<Session>, ApiError> {
        self.sessions.read().get(&id).cloned().ok_or(ApiError::SessionNotFound)
    }
}

fn parse_style(slug: &str) -> Result<PhotoStyle, ApiError> {
    PhotoStyle::from_slug(slug).ok_or_else(|| ApiError::UnknownStyle(slug.to_string()))
}

pub async fn list_styles() -> Json<Vec<PhotoConfig>> {
    Json(view::style_catalogue())
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let session = Arc::new(Session::new(state.generator.clone()));
    let view = view::render(&session.snapshot());
    state.sessions.write().insert(session.id(), session);
    tracing::info!("🎯 Created session {}", view.id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let session = state.session(id)?;
    Ok(Json(view::render(&session.snapshot())))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> StatusCode {
    let removed = state.sessions.write().remove(&id);
    if let Some(session) = removed {
        session.close();
        tracing::info!("🗑️ Removed session {}", id);
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn upload_image(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    let session = state.session(id)?;
    let declared = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let image = codec::read_upload(&body, declared)
        .inspect_err(|e| tracing::info!("⚠️ Ignoring upload for session {}: {}", id, e))?;
    session.select_image(image);
    Ok(Json(view::render(&session.snapshot())))
}

pub async fn generate_all(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = state.session(id)?;
    let status = match session.begin_batch()? {
        Some(batch) => {
            let worker = session.clone();
            tokio::spawn(async move { worker.run_batch(batch).await });
            StatusCode::ACCEPTED
        }
        None => StatusCode::OK,
    };
    Ok((status, Json(view::render(&session.snapshot()))))
}

pub async fn retry_style(
    Path((id, style)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let style = parse_style(&style)?;
    let session = state.session(id)?;
    let status = match session.begin_retry(style)? {
        Some(job) => {
            let worker = session.clone();
            tokio::spawn(async move { worker.run_job(job).await });
            StatusCode::ACCEPTED
        }
        None => StatusCode::OK,
    };
    Ok((status, Json(view::render(&session.snapshot()))))
}

pub async fn download_style(
    Path((id, style)): Path<(Uuid, String)>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let style = parse_style(&style)?;
    let session = state.session(id)?;
    let snapshot = session.snapshot();
    let entry = snapshot.store.get(style);
    let image = match (&entry.image, entry.is_pending) {
        (Some(image), false) => image,
        _ => return Err(ApiError::NoImage(style.to_string())),
    };
    let png = codec::to_png(image).map_err(|e| ApiError::Internal(e.to_string()))?;
    let disposition = format!("attachment; filename=\"{}\"", view::download_filename(style));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    )
        .into_response())
}

/// Server-sent events: the current view, then one view per session change. The stream
/// ends once the session is deleted.
pub async fn session_events(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = state.session(id)?;
    let watched = session.clone();
    let stream = WatchStream::new(session.subscribe())
        .take_while(move |_| future::ready(!watched.is_closed()))
        .map(move |_| {
            let view = view::render(&session.snapshot());
            let event = Event::default()
                .event("session")
                .json_data(&view)
                .unwrap_or_else(|_| Event::default().event("error"));
            Ok(event)
        });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
