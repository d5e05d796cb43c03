//! Domain entities and the request/response payloads exchanged between the
//! gateway and its clients

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::geo::Coordinates;
use crate::validation::{require_non_blank, validate_username};

/// Visibility tier of a pin or circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Visible to everyone
    Public,
    /// Visible to members of the circles the pin is shared with
    Social,
    /// Visible to the owner only
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Social => "social",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "social" => Ok(Visibility::Social),
            "private" => Ok(Visibility::Private),
            other => Err(ValidationError::Visibility(other.to_string())),
        }
    }
}

/// Public profile of a user; `id` is the auth user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: Uuid, username: String, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            username,
            full_name,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a profile update after validating it
    pub fn apply(&mut self, update: &UpdateProfileRequest) -> ValidationResult<()> {
        if let Some(username) = &update.username {
            validate_username(username)?;
            self.username = username.clone();
        }
        if let Some(full_name) = &update.full_name {
            let trimmed = full_name.trim();
            self.full_name = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        Ok(())
    }
}

/// A user-defined group scoping social pins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    /// Only present in responses addressed to the owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Circle {
    pub fn new(name: String, owner_id: Uuid, visibility: Visibility, access_code: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            owner_id,
            visibility,
            access_code: Some(access_code),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Hide the access code from anyone but the owner
    pub fn redacted_for(mut self, viewer: Uuid) -> Self {
        if !self.is_owned_by(viewer) {
            self.access_code = None;
        }
        self
    }

    pub fn apply(&mut self, update: &UpdateCircleRequest) -> ValidationResult<()> {
        if let Some(name) = &update.name {
            self.name = require_non_blank(name, "name")?;
        }
        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }
        Ok(())
    }
}

/// Membership of a user in a circle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Uuid,
    pub circle_id: Uuid,
    pub joined_at: DateTime<Utc>,
}

/// A geo-located memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub location_query: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    #[serde(default)]
    pub social_circle_ids: Vec<Uuid>,
    pub private_pin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pin {
    pub fn from_new(new: NewPin) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            private_pin: new.visibility == Visibility::Private,
            name: new.name,
            description: new.description,
            latitude: new.coordinates.latitude,
            longitude: new.coordinates.longitude,
            location_query: new.location_query,
            image_urls: new.image_urls,
            audio_url: new.audio_url,
            owner_id: new.owner_id,
            visibility: new.visibility,
            social_circle_ids: new.social_circle_ids,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    /// Apply an owner's update. Coordinates are validated individually and
    /// circle ids are dropped once the pin is no longer social.
    pub fn apply(&mut self, update: &UpdatePinRequest) -> ValidationResult<()> {
        if let Some(name) = &update.name {
            self.name = require_non_blank(name, "name")?;
        }
        if let Some(description) = &update.description {
            self.description = non_blank(description);
        }
        if let Some(location_query) = &update.location_query {
            self.location_query = non_blank(location_query);
        }
        let coordinates = Coordinates {
            latitude: update.latitude.unwrap_or(self.latitude),
            longitude: update.longitude.unwrap_or(self.longitude),
        }
        .validated()?;
        self.latitude = coordinates.latitude;
        self.longitude = coordinates.longitude;

        if let Some(visibility) = update.visibility {
            self.visibility = visibility;
        }
        if let Some(ids) = &update.social_circle_ids {
            self.social_circle_ids = dedup_ids(ids);
        }
        if self.visibility != Visibility::Social {
            self.social_circle_ids.clear();
        }
        self.private_pin = self.visibility == Visibility::Private;
        Ok(())
    }
}

/// Validated data of a pin about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewPin {
    pub name: String,
    pub description: Option<String>,
    pub coordinates: Coordinates,
    pub location_query: Option<String>,
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub social_circle_ids: Vec<Uuid>,
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Remove duplicate ids while keeping the first occurrence order
pub fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}

/// Request for account creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Request for password sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request for token refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens of an authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Identity of an account as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Response of sign-up, sign-in, refresh and `me`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: AccountInfo,
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub session: Option<SessionTokens>,
}

/// Request for profile update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Request for circle creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCircleRequest {
    pub name: String,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Request for circle update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCircleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// Request to join a circle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCircleRequest {
    pub access_code: String,
}

/// Request for pin update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_circle_ids: Option<Vec<Uuid>>,
}

/// Plain message body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
