//! HTTP route table and handlers.
//!
//! The routing layer is plain glue: it dispatches to handlers that carry
//! the request context placed in extensions by the tracing middleware.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router, middleware};
use catalog_store::{Album, StoreError};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;

use crate::auth::check_auth;
use crate::state::AppState;
use crate::telemetry::{RequestContext, baggage, trace_context};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/albums", get(get_albums).post(post_albums))
        .route("/albums/", get(empty_album_id))
        .route("/albums/{id}", get(get_album_by_id))
        .layer(middleware::from_fn_with_state(state.clone(), trace_context))
        .with_state(state)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

/// GET /albums: list every album. The only handler that runs the
/// authorization check, so `error=remote401|remoteLatency` apply here.
async fn get_albums(
    State(state): State<AppState>,
    Extension(RequestContext(cx)): Extension<RequestContext>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    {
        let span = cx.span();
        baggage::mirror_to_span(&cx, &span);
    }

    if !check_auth(&state, &cx, raw_query.as_deref()).await {
        return message(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    match state.store.list_all(&cx).await {
        Ok(albums) => (StatusCode::OK, Json(albums)).into_response(),
        Err(err @ StoreError::RowIteration(_)) => {
            state.logger.error(&cx, &format!("row iteration failed: {err}"));
            message(StatusCode::INTERNAL_SERVER_ERROR, "database error")
        }
        Err(err) => {
            state.logger.error(&cx, &format!("unable to query postgres: {err}"));
            message(StatusCode::INTERNAL_SERVER_ERROR, "database down")
        }
    }
}

/// GET /albums/{id}: single album by primary key. Any lookup failure,
/// including "no rows", answers 404.
async fn get_album_by_id(
    State(state): State<AppState>,
    Extension(RequestContext(cx)): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Response {
    if id.is_empty() {
        return message(StatusCode::BAD_REQUEST, "id not specified");
    }

    match state.store.get_by_id(&cx, &id).await {
        Ok(Some(album)) => (StatusCode::OK, Json(album)).into_response(),
        Ok(None) => {
            state.logger.warn(&cx, "unable to find album");
            message(StatusCode::NOT_FOUND, "row not found")
        }
        Err(err) => {
            state.logger.warn(&cx, &format!("unable to find album: {err}"));
            message(StatusCode::NOT_FOUND, "row not found")
        }
    }
}

/// GET /albums/ has no id segment to bind, so the router sends it here.
async fn empty_album_id() -> Response {
    message(StatusCode::BAD_REQUEST, "id not specified")
}

/// POST /albums: insert the album from the JSON body and echo it back.
/// A body that does not bind aborts with no response body written.
async fn post_albums(
    State(state): State<AppState>,
    Extension(RequestContext(cx)): Extension<RequestContext>,
    payload: Result<Json<Album>, JsonRejection>,
) -> Response {
    let Ok(Json(album)) = payload else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.store.insert(&cx, &album).await {
        Ok(()) => (StatusCode::CREATED, Json(album)).into_response(),
        Err(err) => {
            state.logger.error(&cx, &format!("unable to insert rows: {err}"));
            message(StatusCode::INTERNAL_SERVER_ERROR, "unable to insert rows")
        }
    }
}
