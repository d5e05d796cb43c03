//! Pin routes
//!
//! `/` and `/:id` serve public pins to anyone. Everything under `/user`
//! requires a bearer token and applies the visibility rules for the caller.

use axum::{
    Extension, Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    middleware,
    routing::get,
};
use common::{
    geo::{BoundingBox, BoundsQuery},
    models::{MessageResponse, Pin, UpdatePinRequest, Visibility},
    visibility::can_view,
};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    feed::{circle_ids_or_empty, visible_pins},
    middleware::auth_middleware,
    state::AppState,
    upload::{self, PinDraft},
};

pub fn router(state: AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/user", get(list_visible).post(create_pin))
        .route("/user/mine", get(list_mine))
        .route(
            "/user/:id",
            get(get_visible).put(update_pin).delete(delete_pin),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/", get(list_public))
        .route("/:id", get(get_public))
        .merge(user)
}

fn in_bounds(pins: Vec<Pin>, bbox: Option<BoundingBox>) -> Vec<Pin> {
    match bbox {
        Some(bbox) => bbox.filter_pins(pins),
        None => pins,
    }
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Pin> {
    state
        .pins
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Pin"))
}

async fn load_owned(state: &AppState, id: Uuid, user: &AuthUser) -> ApiResult<Pin> {
    let pin = load(state, id).await?;
    if pin.owner_id != user.id {
        return Err(ApiError::Forbidden(
            "Only the owner can change this pin".to_string(),
        ));
    }
    Ok(pin)
}

/// Reject circles the owner does not belong to
async fn check_circles(state: &AppState, owner: Uuid, circle_ids: &[Uuid]) -> ApiResult<()> {
    if circle_ids.is_empty() {
        return Ok(());
    }
    let memberships = state.circles.circle_ids_for_user(owner).await?;
    match circle_ids.iter().find(|id| !memberships.contains(id)) {
        Some(id) => Err(ApiError::BadRequest(format!(
            "Not a member of circle {}",
            id
        ))),
        None => Ok(()),
    }
}

/// Public pins, optionally inside a bounding box
pub async fn list_public(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BoundsQuery>,
) -> ApiResult<Json<Vec<Pin>>> {
    let bbox = query.bounding_box()?;
    let pins = state.pins.list_public().await?;
    Ok(Json(in_bounds(pins, bbox)))
}

pub async fn get_public(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Pin>> {
    let pin = load(&state, id).await?;
    if pin.visibility != Visibility::Public {
        return Err(ApiError::not_found("Pin"));
    }
    Ok(Json(pin))
}

/// Every pin the caller may see
pub async fn list_visible(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<BoundsQuery>,
) -> ApiResult<Json<Vec<Pin>>> {
    let bbox = query.bounding_box()?;
    let pins = visible_pins(state.pins.as_ref(), state.circles.as_ref(), user.id).await?;
    Ok(Json(in_bounds(pins, bbox)))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Pin>>> {
    Ok(Json(state.pins.list_by_owner(user.id).await?))
}

pub async fn get_visible(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Pin>> {
    let pin = load(&state, id).await?;
    let circle_ids = if pin.visibility == Visibility::Social && pin.owner_id != user.id {
        circle_ids_or_empty(state.circles.as_ref(), user.id).await
    } else {
        Vec::new()
    };

    if !can_view(&pin, user.id, &circle_ids) {
        return Err(ApiError::not_found("Pin"));
    }
    Ok(Json(pin))
}

/// Create a pin from a multipart body with optional images and audio
pub async fn create_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Pin>)> {
    // parse
    let form = upload::parse(multipart?, &state.uploads).await?;

    // validate
    form.validate_media()?;
    let draft = PinDraft::from_form(&form)?;
    check_circles(&state, user.id, &draft.social_circle_ids).await?;

    // upload
    let owner = match state.profiles.find_by_id(user.id).await? {
        Some(profile) => profile.username,
        None => user.id.to_string(),
    };
    let media = upload::store_media(
        state.storage.as_ref(),
        &state.buckets,
        &owner,
        &form.images,
        form.audio.as_ref(),
    )
    .await?;

    // persist
    let pin = match state.pins.create(draft.into_new_pin(user.id, media.clone())).await {
        Ok(pin) => pin,
        Err(e) => {
            upload::discard(state.storage.as_ref(), &media.urls()).await;
            return Err(e.into());
        }
    };

    info!("Pin {} created by {}", pin.id, user.id);
    Ok((StatusCode::CREATED, Json(pin)))
}

pub async fn update_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdatePinRequest>,
) -> ApiResult<Json<Pin>> {
    let mut pin = load_owned(&state, id, &user).await?;
    pin.apply(&payload)?;
    if payload.social_circle_ids.is_some() {
        check_circles(&state, user.id, &pin.social_circle_ids).await?;
    }

    let pin = state
        .pins
        .update(&pin)
        .await?
        .ok_or_else(|| ApiError::not_found("Pin"))?;
    Ok(Json(pin))
}

/// Delete a pin, then its media
pub async fn delete_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let pin = load_owned(&state, id, &user).await?;

    if !state.pins.delete(id).await? {
        return Err(ApiError::not_found("Pin"));
    }

    let urls: Vec<String> = pin.image_urls.into_iter().chain(pin.audio_url).collect();
    upload::discard(state.storage.as_ref(), &urls).await;

    info!("Pin {} deleted", id);
    Ok(Json(MessageResponse::new("Pin deleted")))
}
