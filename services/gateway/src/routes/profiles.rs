//! Profile routes

use axum::{
    Extension, Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    middleware,
    routing::{get, post},
};
use common::models::{Profile, UpdateProfileRequest};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    middleware::auth_middleware,
    state::AppState,
    upload,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(own_profile).put(update_profile))
        .route("/avatar", post(upload_avatar))
        .route("/:id", get(profile_by_id))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Profile> {
    state
        .profiles
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))
}

pub async fn own_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(load(&state, user.id).await?))
}

pub async fn profile_by_id(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(load(&state, id).await?))
}

/// Change username and/or full name
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let mut profile = load(&state, user.id).await?;
    let update = UpdateProfileRequest {
        username: payload.username.map(|name| name.trim().to_string()),
        full_name: payload.full_name,
    };
    profile.apply(&update)?;

    if let Some(username) = &update.username {
        if let Some(other) = state.profiles.find_by_username(username).await? {
            if other.id != user.id {
                return Err(ApiError::Conflict("Username already taken".to_string()));
            }
        }
    }

    let profile = state
        .profiles
        .update(&profile)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;
    Ok(Json(profile))
}

/// Replace the avatar with the single `image` part of the body
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Profile>> {
    let mut profile = load(&state, user.id).await?;

    let form = upload::parse(multipart?, &state.uploads).await?;
    form.validate_media()?;
    let image = form.into_single_image()?;

    let url = upload::store_avatar(
        state.storage.as_ref(),
        &state.buckets,
        &profile.username,
        &image,
    )
    .await?;

    let previous = profile.avatar_url.replace(url.clone());
    let profile = state
        .profiles
        .update(&profile)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;

    if let Some(previous) = previous.filter(|previous| *previous != url) {
        upload::discard(state.storage.as_ref(), &[previous]).await;
    }

    info!("Avatar of {} updated", profile.id);
    Ok(Json(profile))
}
