//! Account routes: sign-up, sign-in, refresh, sign-out, me and deletion

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use common::{
    models::{
        AccountInfo, AuthResponse, MessageResponse, Profile, RefreshRequest, SignInRequest,
        SignUpRequest,
    },
    validation::{require_non_blank, validate_email, validate_username},
};
use tracing::{info, warn};

use crate::{
    auth::{AuthSession, AuthUser, SignUpMetadata},
    error::{ApiError, ApiResult},
    extract::ApiJson,
    middleware::auth_middleware,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/signout", post(sign_out))
        .route("/me", get(me))
        .route("/user", delete(delete_account))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
        .route("/refresh", post(refresh))
        .merge(protected)
}

/// Profile of an account; a missing profile is reported as none
async fn profile_of(state: &AppState, account: &AccountInfo) -> ApiResult<Option<Profile>> {
    Ok(state.profiles.find_by_id(account.id).await?)
}

async fn session_response(state: &AppState, session: AuthSession) -> ApiResult<Json<AuthResponse>> {
    let profile = profile_of(state, &session.account).await?;
    Ok(Json(AuthResponse {
        user: session.account,
        profile,
        session: Some(session.tokens),
    }))
}

/// Create an account and its profile
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let email = validate_email(&payload.email)?;
    let username = payload.username.trim().to_string();
    validate_username(&username)?;
    let full_name = payload
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    if state.profiles.find_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let metadata = SignUpMetadata {
        username: username.clone(),
        full_name: full_name.clone(),
    };
    let outcome = state
        .auth
        .sign_up(&email, &payload.password, &metadata)
        .await?;

    let profile = Profile::new(outcome.account.id, username, full_name);
    let profile = match state.profiles.create(&profile).await {
        Ok(profile) => profile,
        Err(e) => {
            if let Err(cleanup) = state.auth.delete_user(outcome.account.id).await {
                warn!(
                    "Failed to remove account {} after profile failure: {}",
                    outcome.account.id, cleanup
                );
            }
            return Err(e.into());
        }
    };

    info!("Account {} signed up as {}", profile.id, profile.username);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: outcome.account,
            profile: Some(profile),
            session: outcome.session,
        }),
    ))
}

/// Open a session; attempts are limited per e-mail
pub async fn sign_in(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignInRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = require_non_blank(&payload.email, "email")?;
    let key = email.to_lowercase();

    if !state.sign_in_limiter.check(&key).await {
        warn!("Sign-in locked out for {}", key);
        return Err(ApiError::TooManyRequests(
            "Too many sign-in attempts, try again later".to_string(),
        ));
    }

    let session = state.auth.sign_in(&email, &payload.password).await?;
    state.sign_in_limiter.reset(&key).await;

    session_response(&state, session).await
}

pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let token = require_non_blank(&payload.refresh_token, "refresh_token")?;
    let session = state.auth.refresh(&token).await?;
    session_response(&state, session).await
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.sign_out(&user).await?;
    Ok(Json(MessageResponse::new("Signed out")))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<AuthResponse>> {
    let account = AccountInfo {
        id: user.id,
        email: user.email,
    };
    let profile = profile_of(&state, &account).await?;
    Ok(Json(AuthResponse {
        user: account,
        profile,
        session: None,
    }))
}

/// Delete the caller's account, then the profile and everything it owns
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MessageResponse>> {
    if let Err(e) = state.auth.sign_out(&user).await {
        warn!("Sign-out before deleting {} failed: {}", user.id, e);
    }
    state.auth.delete_user(user.id).await?;
    state.profiles.delete(user.id).await?;

    info!("Account {} deleted", user.id);
    Ok(Json(MessageResponse::new("Account deleted")))
}
