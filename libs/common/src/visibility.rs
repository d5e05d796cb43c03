//! Rules deciding which pins a user may see

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{Pin, Visibility};

/// Whether `viewer`, member of `circle_ids`, may see `pin`
pub fn can_view(pin: &Pin, viewer: Uuid, circle_ids: &[Uuid]) -> bool {
    if pin.owner_id == viewer {
        return true;
    }
    match pin.visibility {
        Visibility::Public => true,
        Visibility::Social => shares_circle(pin, circle_ids),
        Visibility::Private => false,
    }
}

/// Whether the pin is shared with at least one of the circles
pub fn shares_circle(pin: &Pin, circle_ids: &[Uuid]) -> bool {
    pin.social_circle_ids
        .iter()
        .any(|id| circle_ids.contains(id))
}

/// Concatenate own, public and social pins and drop repeated ids; the first
/// occurrence wins, so the order is own, then public, then social.
pub fn merge_visible(own: Vec<Pin>, public: Vec<Pin>, social: Vec<Pin>) -> Vec<Pin> {
    let mut seen = HashSet::new();
    own.into_iter()
        .chain(public)
        .chain(social)
        .filter(|pin| seen.insert(pin.id))
        .collect()
}
