//! Pins visible to an authenticated user

use common::{models::Pin, visibility::merge_visible};
use tracing::warn;
use uuid::Uuid;

use crate::repositories::{CircleStore, PinStore, StoreResult};

/// Circles of the user; a failed lookup counts as no circles
pub async fn circle_ids_or_empty(circles: &dyn CircleStore, user_id: Uuid) -> Vec<Uuid> {
    match circles.circle_ids_for_user(user_id).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Circle lookup failed for {}, ignoring social pins: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Own pins, public pins of others and social pins shared with one of the
/// user's circles, without duplicates
pub async fn visible_pins(
    pins: &dyn PinStore,
    circles: &dyn CircleStore,
    user_id: Uuid,
) -> StoreResult<Vec<Pin>> {
    let (own, public, circle_ids) = tokio::join!(
        pins.list_by_owner(user_id),
        pins.list_public_excluding(user_id),
        circle_ids_or_empty(circles, user_id),
    );

    let social = pins.list_social_excluding(user_id, &circle_ids).await?;
    Ok(merge_visible(own?, public?, social))
}
