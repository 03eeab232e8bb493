use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
};
use std::sync::Arc;
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::command::{Request, Response};
use crate::error::BlacklistError;
use crate::types::{
    AddRequest, AppState, ContainResponse, ErrorResponse, StatsResponse,
};
use crate::url::is_valid_url;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        add_url,
        contain_url,
        delete_url,
        stats,
    ),
    components(
        schemas(AddRequest, ContainResponse, StatsResponse, ErrorResponse)
    ),
    tags(
        (name = "blacklist", description = "Bloom-filtered URL blacklist API")
    )
)]
struct ApiDoc;

fn error_response(status: StatusCode, message: String) -> HttpResponse {
    (status, Json(ErrorResponse { message })).into_response()
}

fn internal_error(e: BlacklistError) -> HttpResponse {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn bad_url(url: &str) -> HttpResponse {
    error_response(StatusCode::BAD_REQUEST, format!("malformed url '{url}'"))
}

/// Check API health
#[utoipa::path(
    get,
    path = "/health",
    tag = "blacklist",
    responses(
        (status = 200, description = "API is healthy")
    )
)]
async fn health_check() -> impl IntoResponse {
    debug!("Health check");
    StatusCode::OK
}

/// Add a URL to the blacklist
#[utoipa::path(
    post,
    path = "/blacklist",
    tag = "blacklist",
    request_body = AddRequest,
    responses(
        (status = 201, description = "URL added"),
        (status = 400, description = "Malformed URL", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn add_url(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddRequest>,
) -> HttpResponse {
    debug!("Adding url: {}", &request.url);
    if !is_valid_url(&request.url) {
        return bad_url(&request.url);
    }
    match state.engine.execute(&Request::add(request.url)) {
        Ok(_) => StatusCode::CREATED.into_response(),
        Err(e) => internal_error(e),
    }
}

/// Check whether a URL is blacklisted
#[utoipa::path(
    get,
    path = "/blacklist/{url}",
    tag = "blacklist",
    params(
        ("url" = String, Path, description = "URL to check")
    ),
    responses(
        (status = 200, description = "Check done", body = ContainResponse),
        (status = 400, description = "Malformed URL", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn contain_url(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
) -> HttpResponse {
    debug!("Checking url: {}", &url);
    if !is_valid_url(&url) {
        return bad_url(&url);
    }
    match state.engine.execute(&Request::contain(url)) {
        Ok(Response::Contains {
            filter_hit,
            exact_hit,
        }) => (
            StatusCode::OK,
            Json(ContainResponse {
                filter_hit,
                exact_hit,
                blacklisted: filter_hit && exact_hit,
            }),
        )
            .into_response(),
        Ok(other) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unexpected response: {other}"),
        ),
        Err(e) => internal_error(e),
    }
}

/// Remove a URL from the blacklist
#[utoipa::path(
    delete,
    path = "/blacklist/{url}",
    tag = "blacklist",
    params(
        ("url" = String, Path, description = "URL to remove")
    ),
    responses(
        (status = 204, description = "URL removed"),
        (status = 404, description = "URL not blacklisted"),
        (status = 400, description = "Malformed URL", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(url): Path<String>,
) -> HttpResponse {
    debug!("Deleting url: {}", &url);
    if !is_valid_url(&url) {
        return bad_url(&url);
    }
    match state.engine.execute(&Request::delete(url)) {
        Ok(Response::NoContent) => StatusCode::NO_CONTENT.into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => internal_error(e),
    }
}

/// Filter and blacklist statistics
#[utoipa::path(
    get,
    path = "/stats",
    tag = "blacklist",
    responses(
        (status = 200, description = "Current statistics", body = StatsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn stats(State(state): State<Arc<AppState>>) -> HttpResponse {
    match state.engine.stats() {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatsResponse {
                array_size: stats.array_size,
                hash_functions: stats.hash_functions,
                bits_set: stats.bits_set,
                blacklisted: stats.blacklisted,
            }),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi),
        )
        .route("/health", get(health_check))
        .route("/blacklist", post(add_url))
        .route("/blacklist/{*url}", get(contain_url).delete(delete_url))
        .route("/stats", get(stats))
        .with_state(state)
}
