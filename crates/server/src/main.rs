use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use server_api::{list_calendars, replace_calendars, ApiContext};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{CalendarsPayload, CALENDARS_ROUTE, HEALTHZ_ROUTE},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, normalize_database_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify the path is writable"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        max_body_bytes: settings.max_body_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, %database_url, "calendar list store listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route(HEALTHZ_ROUTE, get(healthz))
        .route(
            CALENDARS_ROUTE,
            get(http_list_calendars).post(http_replace_calendars),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(
    State(state): State<Arc<AppState>>,
) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    server_api::health(&state.api)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(e)))?;
    Ok("ok")
}

async fn http_list_calendars(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CalendarsPayload>, (StatusCode, Json<ApiError>)> {
    let calendars = list_calendars(&state.api).await.map_err(error_response)?;
    Ok(Json(CalendarsPayload::new(calendars)))
}

async fn http_replace_calendars(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CalendarsPayload>,
) -> Result<Json<CalendarsPayload>, (StatusCode, Json<ApiError>)> {
    let calendars = replace_calendars(&state.api, req.calendars)
        .await
        .map_err(error_response)?;
    Ok(Json(CalendarsPayload::new(calendars)))
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
