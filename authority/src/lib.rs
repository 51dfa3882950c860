//! HTTP API for the Keyward reference authority.
//!
//! Serves the `/api/v1/licenses` mapping the HTTP client speaks, over any
//! [`RemoteAuthority`]. Records cross the wire as [`WireLicense`].

use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use keyward_authority::wire::{
    BindRequest, BlacklistRequest, CreateLicenseRequest, CreateLicenseResponse, ErrorBody,
    WireLicense,
};
use keyward_authority::{AuthorityError, RemoteAuthority};
use keyward_types::{LicensePatch, LicenseToken};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
struct AppState {
    authority: Arc<dyn RemoteAuthority>,
    api_key: Option<Arc<str>>,
}

/// An error answered as `{"error": ...}` with a matching status code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    unknown_token: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            unknown_token: false,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<AuthorityError> for ApiError {
    fn from(e: AuthorityError) -> Self {
        let status = match &e {
            AuthorityError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthorityError::Rejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AuthorityError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AuthorityError::Network(_) | AuthorityError::MalformedResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            AuthorityError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("authority error: {e}");
        }
        Self {
            unknown_token: matches!(e, AuthorityError::NotFound(_)),
            ..Self::new(status, e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Clients only trust a 404 that carries the not-found code.
        let body = if self.unknown_token {
            ErrorBody::not_found(self.message)
        } else {
            ErrorBody::new(self.message)
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_token(raw: &str) -> ApiResult<LicenseToken> {
    LicenseToken::parse(raw).map_err(|e| ApiError::bad_request(e.to_string()))
}

async fn list_licenses(State(state): State<AppState>) -> ApiResult<Json<Vec<WireLicense>>> {
    let records = state.authority.list_licenses().await?;
    Ok(Json(records.iter().map(WireLicense::from).collect()))
}

async fn create_license(
    State(state): State<AppState>,
    Json(body): Json<CreateLicenseRequest>,
) -> ApiResult<(StatusCode, Json<CreateLicenseResponse>)> {
    let token = state
        .authority
        .create_license(body.expiry_date, &body.memo)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateLicenseResponse {
            token: token.to_string(),
        }),
    ))
}

async fn get_license(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<WireLicense>> {
    let token = parse_token(&token)?;
    let record = state.authority.get_license(&token).await?;
    Ok(Json(WireLicense::from(&record)))
}

async fn patch_license(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(patch): Json<LicensePatch>,
) -> ApiResult<StatusCode> {
    let token = parse_token(&token)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("patch changes nothing"));
    }
    state.authority.patch_license(&token, &patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_license(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<StatusCode> {
    let token = parse_token(&token)?;
    state.authority.soft_delete_license(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_blacklist(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<BlacklistRequest>,
) -> ApiResult<StatusCode> {
    let token = parse_token(&token)?;
    state
        .authority
        .set_blacklist(&token, body.blacklisted)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bind_license(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<BindRequest>,
) -> ApiResult<Json<WireLicense>> {
    let token = parse_token(&token)?;
    if body.fingerprint_hash.trim().is_empty() {
        return Err(ApiError::bad_request("fingerprint_hash must not be empty"));
    }
    let record = state
        .authority
        .validate_and_bind(&token, &body.fingerprint_hash, &body.app_name)
        .await?;
    Ok(Json(WireLicense::from(&record)))
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        next.run(request).await
    } else {
        debug!("rejecting {} {}: bad api key", request.method(), request.uri());
        ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid api key").into_response()
    }
}

/// Build the HTTP API router over `authority`.
///
/// With `api_key` set, every license route requires
/// `Authorization: Bearer <api_key>`.
pub fn build_router(authority: Arc<dyn RemoteAuthority>, api_key: Option<String>) -> Router {
    let state = AppState {
        authority,
        api_key: api_key.map(Arc::from),
    };

    Router::new()
        .route("/api/v1/licenses", get(list_licenses).post(create_license))
        .route(
            "/api/v1/licenses/{token}",
            get(get_license).patch(patch_license).delete(delete_license),
        )
        .route("/api/v1/licenses/{token}/blacklist", put(set_blacklist))
        .route("/api/v1/licenses/{token}/bind", post(bind_license))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}
