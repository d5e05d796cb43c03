//! Circle and membership routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use common::{
    access_code,
    models::{Circle, CreateCircleRequest, JoinCircleRequest, Member, MessageResponse, UpdateCircleRequest},
    validation::require_non_blank,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    middleware::auth_middleware,
    state::AppState,
};

/// Attempts at drawing an access code nobody uses yet
const CODE_ATTEMPTS: usize = 5;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_circles).post(create_circle))
        .route("/discover", get(discover_circles))
        .route("/join", post(join_by_code))
        .route("/:id", get(get_circle).put(update_circle).delete(delete_circle))
        .route("/:id/access-code", post(rotate_access_code))
        .route("/:id/members", get(list_members).post(join_circle))
        .route("/:id/members/:user_id", delete(remove_member))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

async fn load(state: &AppState, id: Uuid) -> ApiResult<Circle> {
    state
        .circles
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Circle"))
}

fn require_owner(circle: &Circle, user: &AuthUser) -> ApiResult<()> {
    if circle.is_owned_by(user.id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Only the owner can change this circle".to_string(),
        ))
    }
}

async fn require_member(state: &AppState, circle: &Circle, user: &AuthUser) -> ApiResult<()> {
    if circle.is_owned_by(user.id) || state.circles.is_member(circle.id, user.id).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not a member of this circle".to_string()))
    }
}

/// Draw an access code not used by any circle
async fn unused_access_code(state: &AppState) -> ApiResult<String> {
    for _ in 0..CODE_ATTEMPTS {
        let code = access_code::generate();
        if state.circles.find_by_access_code(&code).await?.is_none() {
            return Ok(code);
        }
        warn!("Access code collision, drawing again");
    }
    Err(ApiError::Conflict(
        "Could not generate a unique access code".to_string(),
    ))
}

async fn add_member(state: &AppState, circle: &Circle, user_id: Uuid) -> ApiResult<Member> {
    let member = state
        .circles
        .add_member(circle.id, user_id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Already a member of this circle".to_string()))?;
    info!("User {} joined circle {}", user_id, circle.id);
    Ok(member)
}

fn code_matches(circle: &Circle, submitted: &str) -> bool {
    let submitted = access_code::normalize(submitted);
    !submitted.is_empty() && circle.access_code.as_deref() == Some(submitted.as_str())
}

/// Circles the caller owns or belongs to
pub async fn list_circles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Circle>>> {
    let circles = state.circles.list_for_user(user.id).await?;
    Ok(Json(
        circles.into_iter().map(|c| c.redacted_for(user.id)).collect(),
    ))
}

/// Public circles
pub async fn discover_circles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Circle>>> {
    let circles = state.circles.list_public().await?;
    Ok(Json(
        circles.into_iter().map(|c| c.redacted_for(user.id)).collect(),
    ))
}

pub async fn create_circle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateCircleRequest>,
) -> ApiResult<(StatusCode, Json<Circle>)> {
    let name = require_non_blank(&payload.name, "name")?;
    let code = unused_access_code(&state).await?;

    let circle = state
        .circles
        .create(&Circle::new(name, user.id, payload.visibility, code))
        .await?;

    info!("Circle {} created by {}", circle.id, user.id);
    Ok((StatusCode::CREATED, Json(circle)))
}

pub async fn get_circle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Circle>> {
    let circle = load(&state, id).await?;
    require_member(&state, &circle, &user).await?;
    Ok(Json(circle.redacted_for(user.id)))
}

pub async fn update_circle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCircleRequest>,
) -> ApiResult<Json<Circle>> {
    let mut circle = load(&state, id).await?;
    require_owner(&circle, &user)?;
    circle.apply(&payload)?;

    let circle = state
        .circles
        .update(&circle)
        .await?
        .ok_or_else(|| ApiError::not_found("Circle"))?;
    Ok(Json(circle))
}

pub async fn delete_circle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let circle = load(&state, id).await?;
    require_owner(&circle, &user)?;

    if !state.circles.delete(id).await? {
        return Err(ApiError::not_found("Circle"));
    }
    info!("Circle {} deleted", id);
    Ok(Json(MessageResponse::new("Circle deleted")))
}

/// Replace the access code; the old one stops working
pub async fn rotate_access_code(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Circle>> {
    let mut circle = load(&state, id).await?;
    require_owner(&circle, &user)?;
    circle.access_code = Some(unused_access_code(&state).await?);

    let circle = state
        .circles
        .update(&circle)
        .await?
        .ok_or_else(|| ApiError::not_found("Circle"))?;
    Ok(Json(circle))
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
    let circle = load(&state, id).await?;
    require_member(&state, &circle, &user).await?;
    Ok(Json(state.circles.list_members(id).await?))
}

/// Join a known circle with its access code
pub async fn join_circle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<JoinCircleRequest>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    let circle = load(&state, id).await?;
    if !code_matches(&circle, &payload.access_code) {
        return Err(ApiError::Forbidden("Invalid access code".to_string()));
    }
    let member = add_member(&state, &circle, user.id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Join whichever circle the access code belongs to
pub async fn join_by_code(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<JoinCircleRequest>,
) -> ApiResult<(StatusCode, Json<Circle>)> {
    let code = access_code::normalize(&payload.access_code);
    if code.is_empty() {
        return Err(ApiError::BadRequest("access_code is required".to_string()));
    }
    let circle = state
        .circles
        .find_by_access_code(&code)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Invalid access code".to_string()))?;

    add_member(&state, &circle, user.id).await?;
    Ok((StatusCode::CREATED, Json(circle.redacted_for(user.id))))
}

/// The owner removes a member, or a member leaves
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath((id, member_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    let circle = load(&state, id).await?;

    if circle.is_owned_by(member_id) {
        return Err(ApiError::BadRequest(
            "The owner cannot leave the circle; delete it instead".to_string(),
        ));
    }
    if !circle.is_owned_by(user.id) && member_id != user.id {
        return Err(ApiError::Forbidden(
            "Only the owner can remove other members".to_string(),
        ));
    }

    if !state.circles.remove_member(id, member_id).await? {
        return Err(ApiError::not_found("Member"));
    }
    info!("User {} removed from circle {}", member_id, id);
    Ok(Json(MessageResponse::new("Member removed")))
}
