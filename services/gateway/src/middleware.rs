//! Authentication middleware for bearer tokens

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Resolve the bearer token into an [`AuthUser`] stored in the request
/// extensions. Requests without a valid token never reach the handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        debug!("Missing bearer token on {}", req.uri().path());
        return Err(ApiError::unauthorized());
    };

    let user: AuthUser = state.auth.verify(bearer.token()).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
