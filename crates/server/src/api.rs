//! JSON API for the quote lifecycle.
//!
//! Mounted under `/api` by [`app`]:
//! - `GET|POST /quotes`, `GET|PATCH /quotes/{id}` for the internal team
//! - `GET|POST /approve/{token}` for the approver holding the approval token
//! - `GET|POST /q/{token}` for the customer holding the customer view token

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lynco_core::domain::acceptance::ClientOrigin;
use lynco_core::errors::{ApplicationError, InterfaceError};
use lynco_core::lifecycle::QuoteLifecycle;
use lynco_db::DbPool;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, Level};
use uuid::Uuid;

use crate::{health, portal, quotes};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    lifecycle: QuoteLifecycle,
    expose_error_details: bool,
}

impl AppState {
    pub fn new(lifecycle: QuoteLifecycle, expose_error_details: bool) -> Self {
        Self { lifecycle, expose_error_details }
    }

    pub fn lifecycle(&self) -> &QuoteLifecycle {
        &self.lifecycle
    }

    pub fn reject(&self, error: ApplicationError, correlation: &CorrelationId) -> ApiError {
        ApiError {
            error: error.into_interface(correlation.as_str()),
            expose_details: self.expose_error_details,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/quotes", get(quotes::list).post(quotes::create))
        .route("/quotes/{id}", get(quotes::detail).patch(quotes::update_status))
        .route("/approve/{token}", get(portal::approval_view).post(portal::decide))
        .route("/q/{token}", get(portal::customer_view).post(portal::accept))
        .with_state(state)
}

/// Full HTTP surface: the API under `/api`, `/health`, request ids and tracing.
pub fn app(state: AppState, db_pool: DbPool) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let correlation_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                correlation_id
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .nest("/api", router(state))
        .merge(health::router(db_pool))
        .layer(trace)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Request id from `x-request-id`, or a fresh one when the header is absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CorrelationId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Client address and agent recorded with a customer acceptance.
pub fn client_origin(headers: &HeaderMap) -> ClientOrigin {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    let forwarded = header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    let ip = forwarded.or_else(|| header("x-real-ip")).map(str::to_string);

    ClientOrigin { ip, user_agent: header("user-agent").map(str::to_string) }
}

/// JSON body whose rejections use the API error shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let correlation = CorrelationId::from_headers(request.headers());
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text(), &correlation)),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    error: InterfaceError,
    expose_details: bool,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>, correlation: &CorrelationId) -> Self {
        Self {
            error: InterfaceError::BadRequest {
                message: message.into(),
                correlation_id: correlation.as_str().to_string(),
            },
            expose_details: false,
        }
    }

    fn status(&self) -> StatusCode {
        match self.error {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'static str,
    correlation_id: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = &self.error;
        if error.is_internal() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %error.correlation_id(),
                error = %error.message(),
                "request failed with internal error"
            );
        }

        let message = if error.is_internal() && !self.expose_details {
            error.user_message()
        } else {
            error.message()
        };
        let body =
            ErrorBody { error: message, code: error.code(), correlation_id: error.correlation_id() };

        (self.status(), Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}
