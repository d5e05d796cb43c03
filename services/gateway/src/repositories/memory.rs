//! In-memory implementation of every store
//!
//! Mirrors the constraints of the SQL schema: unique usernames and access
//! codes, one membership per (user, circle) and cascading deletes from
//! profiles and circles. Every store call is counted so tests can assert
//! that rejected requests never reached the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::models::{Circle, Member, NewPin, Pin, Profile, Visibility};
use common::visibility::shares_circle;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CircleStore, PinStore, ProfileStore, StoreError, StoreResult};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    circles: HashMap<Uuid, Circle>,
    members: Vec<Member>,
    /// Insertion order is kept so listings are stable
    pins: Vec<Pin>,
}

/// Process-local relational store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn create(&self, profile: &Profile) -> StoreResult<Profile> {
        self.hit();
        let mut tables = self.tables.write().await;
        if tables
            .profiles
            .values()
            .any(|p| p.username == profile.username)
        {
            return Err(StoreError::Conflict("Username is already taken".to_string()));
        }
        if tables.profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict("Profile already exists".to_string()));
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        self.hit();
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Profile>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn update(&self, profile: &Profile) -> StoreResult<Option<Profile>> {
        self.hit();
        let mut tables = self.tables.write().await;
        if tables
            .profiles
            .values()
            .any(|p| p.id != profile.id && p.username == profile.username)
        {
            return Err(StoreError::Conflict("Username is already taken".to_string()));
        }
        Ok(tables.profiles.get_mut(&profile.id).map(|existing| {
            existing.username = profile.username.clone();
            existing.full_name = profile.full_name.clone();
            existing.avatar_url = profile.avatar_url.clone();
            existing.updated_at = Utc::now();
            existing.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.hit();
        let mut tables = self.tables.write().await;
        if tables.profiles.remove(&id).is_none() {
            return Ok(false);
        }
        let owned: Vec<Uuid> = tables
            .circles
            .values()
            .filter(|c| c.owner_id == id)
            .map(|c| c.id)
            .collect();
        tables.circles.retain(|_, c| c.owner_id != id);
        tables
            .members
            .retain(|m| m.user_id != id && !owned.contains(&m.circle_id));
        tables.pins.retain(|p| p.owner_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CircleStore for MemoryStore {
    async fn create(&self, circle: &Circle) -> StoreResult<Circle> {
        self.hit();
        let mut tables = self.tables.write().await;
        if circle.access_code.is_none() {
            return Err(StoreError::InvalidRow("circle without access code".to_string()));
        }
        if tables
            .circles
            .values()
            .any(|c| c.access_code == circle.access_code)
        {
            return Err(StoreError::Conflict("Access code already in use".to_string()));
        }
        tables.circles.insert(circle.id, circle.clone());
        tables.members.push(Member {
            user_id: circle.owner_id,
            circle_id: circle.id,
            joined_at: circle.created_at,
        });
        Ok(circle.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Circle>> {
        self.hit();
        Ok(self.tables.read().await.circles.get(&id).cloned())
    }

    async fn find_by_access_code(&self, code: &str) -> StoreResult<Option<Circle>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .circles
            .values()
            .find(|c| c.access_code.as_deref() == Some(code))
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Circle>> {
        self.hit();
        let tables = self.tables.read().await;
        let circles = tables
            .circles
            .values()
            .filter(|c| {
                c.owner_id == user_id
                    || tables
                        .members
                        .iter()
                        .any(|m| m.circle_id == c.id && m.user_id == user_id)
            })
            .cloned()
            .collect();
        Ok(newest_first(circles, |c: &Circle| c.created_at))
    }

    async fn list_public(&self) -> StoreResult<Vec<Circle>> {
        self.hit();
        let tables = self.tables.read().await;
        let circles = tables
            .circles
            .values()
            .filter(|c| c.visibility == Visibility::Public)
            .cloned()
            .collect();
        Ok(newest_first(circles, |c: &Circle| c.created_at))
    }

    async fn circle_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.circle_id)
            .collect())
    }

    async fn update(&self, circle: &Circle) -> StoreResult<Option<Circle>> {
        self.hit();
        let mut tables = self.tables.write().await;
        if circle.access_code.is_some()
            && tables
                .circles
                .values()
                .any(|c| c.id != circle.id && c.access_code == circle.access_code)
        {
            return Err(StoreError::Conflict("Access code already in use".to_string()));
        }
        Ok(tables.circles.get_mut(&circle.id).map(|existing| {
            existing.name = circle.name.clone();
            existing.visibility = circle.visibility;
            if circle.access_code.is_some() {
                existing.access_code = circle.access_code.clone();
            }
            existing.updated_at = Utc::now();
            existing.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.hit();
        let mut tables = self.tables.write().await;
        let removed = tables.circles.remove(&id).is_some();
        tables.members.retain(|m| m.circle_id != id);
        Ok(removed)
    }

    async fn list_members(&self, circle_id: Uuid) -> StoreResult<Vec<Member>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .filter(|m| m.circle_id == circle_id)
            .cloned()
            .collect())
    }

    async fn is_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .members
            .iter()
            .any(|m| m.circle_id == circle_id && m.user_id == user_id))
    }

    async fn add_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<Option<Member>> {
        self.hit();
        let mut tables = self.tables.write().await;
        if !tables.circles.contains_key(&circle_id) {
            return Err(StoreError::InvalidRow(format!("circle {} does not exist", circle_id)));
        }
        if tables
            .members
            .iter()
            .any(|m| m.circle_id == circle_id && m.user_id == user_id)
        {
            return Ok(None);
        }
        let member = Member {
            user_id,
            circle_id,
            joined_at: Utc::now(),
        };
        tables.members.push(member.clone());
        Ok(Some(member))
    }

    async fn remove_member(&self, circle_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.hit();
        let mut tables = self.tables.write().await;
        let before = tables.members.len();
        tables
            .members
            .retain(|m| !(m.circle_id == circle_id && m.user_id == user_id));
        Ok(tables.members.len() < before)
    }
}

#[async_trait]
impl PinStore for MemoryStore {
    async fn create(&self, pin: NewPin) -> StoreResult<Pin> {
        self.hit();
        let pin = Pin::from_new(pin);
        self.tables.write().await.pins.push(pin.clone());
        Ok(pin)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Pin>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables.pins.iter().find(|p| p.id == id).cloned())
    }

    async fn list_public(&self) -> StoreResult<Vec<Pin>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .pins
            .iter()
            .filter(|p| p.visibility == Visibility::Public)
            .cloned()
            .collect())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .pins
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_public_excluding(&self, owner_id: Uuid) -> StoreResult<Vec<Pin>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .pins
            .iter()
            .filter(|p| p.visibility == Visibility::Public && p.owner_id != owner_id)
            .cloned()
            .collect())
    }

    async fn list_social_excluding(
        &self,
        owner_id: Uuid,
        circle_ids: &[Uuid],
    ) -> StoreResult<Vec<Pin>> {
        self.hit();
        let tables = self.tables.read().await;
        Ok(tables
            .pins
            .iter()
            .filter(|p| {
                p.visibility == Visibility::Social
                    && p.owner_id != owner_id
                    && shares_circle(p, circle_ids)
            })
            .cloned()
            .collect())
    }

    async fn update(&self, pin: &Pin) -> StoreResult<Option<Pin>> {
        self.hit();
        let mut tables = self.tables.write().await;
        Ok(tables.pins.iter_mut().find(|p| p.id == pin.id).map(|existing| {
            let created_at = existing.created_at;
            let owner_id = existing.owner_id;
            *existing = pin.clone();
            existing.created_at = created_at;
            existing.owner_id = owner_id;
            existing.private_pin = existing.visibility == Visibility::Private;
            existing.updated_at = Utc::now();
            existing.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.hit();
        let mut tables = self.tables.write().await;
        let before = tables.pins.len();
        tables.pins.retain(|p| p.id != id);
        Ok(tables.pins.len() < before)
    }
}
