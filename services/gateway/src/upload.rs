//! Multipart upload pipeline
//!
//! Uploads go through four stages, each returning early on failure:
//!
//! 1. [`parse`] reads the multipart body into a [`ParsedForm`],
//! 2. [`ParsedForm::validate_media`] and [`PinDraft::from_form`] check file
//!    types and text fields,
//! 3. [`store_media`] writes the files to object storage,
//! 4. the caller persists the row with the returned URLs.
//!
//! Nothing reaches storage before stage 2 passed.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use chrono::Utc;
use common::{
    ValidationError,
    geo::Coordinates,
    models::{NewPin, Visibility, dedup_ids},
    validation::{parse_degrees, require_non_blank},
};
use rand::{Rng, distributions::Alphanumeric};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::storage::{Buckets, ObjectStorage, PutObject, StorageError};

/// Largest accepted text field
const MAX_TEXT_BYTES: usize = 64 * 1024;

/// Size and count limits of uploads
#[derive(Debug, Clone, Deserialize)]
pub struct UploadLimits {
    /// Images accepted per pin
    pub max_images: usize,
    /// Largest accepted file, in bytes
    pub max_file_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_images: 5,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UploadLimits {
    /// Upper bound of a whole request body
    pub fn body_limit(&self) -> usize {
        (self.max_images + 1) * self.max_file_bytes + 1024 * 1024
    }
}

/// Kind of media carried by a file field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    fn from_field(name: &str) -> Option<Self> {
        match name {
            "image" => Some(MediaKind::Image),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
        }
    }

    /// Required prefix of the MIME type
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Audio => "audio/",
        }
    }

    pub fn bucket<'a>(&self, buckets: &'a Buckets) -> &'a str {
        match self {
            MediaKind::Image => &buckets.images,
            MediaKind::Audio => &buckets.audio,
        }
    }
}

/// A file received in a multipart body
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl MediaFile {
    /// Whether the MIME type matches the field the file was sent in
    pub fn has_valid_type(&self) -> bool {
        self.content_type
            .to_ascii_lowercase()
            .starts_with(self.kind.mime_prefix())
    }
}

/// Errors of the upload pipeline
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    #[error("Unexpected file field '{0}'")]
    UnexpectedFile(String),

    #[error("At most {0} images can be uploaded")]
    TooManyImages(usize),

    #[error("Only one audio file can be uploaded")]
    DuplicateAudio,

    #[error("File in field '{field}' exceeds {limit} bytes")]
    FileTooLarge { field: &'static str, limit: usize },

    #[error("Field '{field}' must be {expected}* but was '{content_type}'")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
        content_type: String,
    },

    #[error("A file is required in field '{0}'")]
    MissingFile(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to store file: {0}")]
    Storage(#[from] StorageError),
}

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError::Malformed(err.body_text())
    }
}

/// Stage 1 output: text fields and files of a multipart body
#[derive(Debug, Default)]
pub struct ParsedForm {
    fields: HashMap<String, Vec<String>>,
    pub images: Vec<MediaFile>,
    pub audio: Option<MediaFile>,
}

impl ParsedForm {
    /// First value of a text field
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a repeated text field
    pub fn all(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn files(&self) -> impl Iterator<Item = &MediaFile> {
        self.images.iter().chain(self.audio.iter())
    }

    /// Stage 2: every file must carry the MIME type of its field
    pub fn validate_media(&self) -> Result<(), UploadError> {
        match self.files().find(|file| !file.has_valid_type()) {
            Some(file) => Err(UploadError::InvalidType {
                field: file.kind.field_name(),
                expected: file.kind.mime_prefix(),
                content_type: file.content_type.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The single image of an avatar upload
    pub fn into_single_image(mut self) -> Result<MediaFile, UploadError> {
        if self.audio.is_some() {
            return Err(UploadError::UnexpectedFile("audio".to_string()));
        }
        if self.images.len() > 1 {
            return Err(UploadError::TooManyImages(1));
        }
        self.images.pop().ok_or(UploadError::MissingFile("image"))
    }
}

/// Stage 1: read the multipart body
pub async fn parse(mut multipart: Multipart, limits: &UploadLimits) -> Result<ParsedForm, UploadError> {
    let mut form = ParsedForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(kind) = MediaKind::from_field(&name) else {
            if field.file_name().is_some() {
                return Err(UploadError::UnexpectedFile(name));
            }
            let value = field.text().await?;
            if value.len() > MAX_TEXT_BYTES {
                return Err(UploadError::Malformed(format!("field '{}' is too long", name)));
            }
            form.fields.entry(name).or_default().push(value);
            continue;
        };

        match kind {
            MediaKind::Image if form.images.len() >= limits.max_images => {
                return Err(UploadError::TooManyImages(limits.max_images));
            }
            MediaKind::Audio if form.audio.is_some() => return Err(UploadError::DuplicateAudio),
            _ => {}
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > limits.max_file_bytes {
                return Err(UploadError::FileTooLarge {
                    field: kind.field_name(),
                    limit: limits.max_file_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        let file = MediaFile {
            kind,
            file_name,
            content_type,
            data: Bytes::from(data),
        };
        match kind {
            MediaKind::Image => form.images.push(file),
            MediaKind::Audio => form.audio = Some(file),
        }
    }

    Ok(form)
}

/// Stage 2 output for pins: validated text fields
#[derive(Debug, Clone, PartialEq)]
pub struct PinDraft {
    pub name: String,
    pub description: Option<String>,
    pub coordinates: Coordinates,
    pub location_query: Option<String>,
    pub visibility: Visibility,
    pub social_circle_ids: Vec<Uuid>,
}

impl PinDraft {
    pub fn from_form(form: &ParsedForm) -> Result<Self, ValidationError> {
        let name = require_non_blank(form.text("name").unwrap_or_default(), "name")?;
        let latitude = form
            .text("latitude")
            .ok_or(ValidationError::Required("latitude"))
            .and_then(|v| parse_degrees(v, "latitude"))?;
        let longitude = form
            .text("longitude")
            .ok_or(ValidationError::Required("longitude"))
            .and_then(|v| parse_degrees(v, "longitude"))?;
        let coordinates = Coordinates::new(latitude, longitude)?;

        let visibility = match form.text("visibility") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => Visibility::default(),
        };

        let social_circle_ids = if visibility == Visibility::Social {
            parse_circle_ids(form.all("social_circle_ids"))?
        } else {
            Vec::new()
        };

        Ok(Self {
            name,
            description: form.text("description").and_then(optional_text),
            coordinates,
            location_query: form.text("location_query").and_then(optional_text),
            visibility,
            social_circle_ids,
        })
    }

    /// Stage 4 input: attach the stored media
    pub fn into_new_pin(self, owner_id: Uuid, media: StoredMedia) -> NewPin {
        NewPin {
            name: self.name,
            description: self.description,
            coordinates: self.coordinates,
            location_query: self.location_query,
            image_urls: media.image_urls,
            audio_url: media.audio_url,
            owner_id,
            visibility: self.visibility,
            social_circle_ids: self.social_circle_ids,
        }
    }
}

fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Circle ids may come as repeated fields, a JSON array or a comma separated
/// list
fn parse_circle_ids(values: &[String]) -> Result<Vec<Uuid>, ValidationError> {
    let invalid = |reason: String| ValidationError::Field {
        field: "social_circle_ids",
        reason,
    };

    let mut ids = Vec::new();
    for value in values {
        let value = value.trim();
        if value.starts_with('[') {
            let parsed: Vec<Uuid> =
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?;
            ids.extend(parsed);
        } else {
            for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                ids.push(
                    part.parse::<Uuid>()
                        .map_err(|_| invalid(format!("'{}' is not a valid id", part)))?,
                );
            }
        }
    }
    Ok(dedup_ids(&ids))
}

/// Stage 3 output: public URLs of the stored files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredMedia {
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
}

impl StoredMedia {
    pub fn urls(&self) -> Vec<String> {
        self.image_urls
            .iter()
            .chain(self.audio_url.iter())
            .cloned()
            .collect()
    }
}

/// Object key of an uploaded file: `<owner>/<kind>-<millis>-<random>.<ext>`
pub fn object_key(owner: &str, file: &MediaFile, millis: i64, suffix: &str) -> String {
    format!(
        "{}/{}-{}-{}.{}",
        key_segment(owner),
        file.kind.field_name(),
        millis,
        suffix,
        extension(file)
    )
}

fn key_segment(owner: &str) -> String {
    let cleaned: String = owner
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

fn extension(file: &MediaFile) -> String {
    let clean = |s: &str| -> Option<String> {
        let ext: String = s
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        (!ext.is_empty() && ext.len() <= 8).then_some(ext)
    };

    file.file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| clean(ext))
        .or_else(|| {
            file.content_type
                .split_once('/')
                .and_then(|(_, subtype)| clean(subtype))
        })
        .unwrap_or_else(|| "bin".to_string())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Stage 3: store every file. When one upload fails, the files already stored
/// by this call are removed again.
pub async fn store_media(
    storage: &dyn ObjectStorage,
    buckets: &Buckets,
    owner: &str,
    images: &[MediaFile],
    audio: Option<&MediaFile>,
) -> Result<StoredMedia, UploadError> {
    let mut stored = StoredMedia::default();

    for file in images.iter().chain(audio) {
        let key = object_key(owner, file, Utc::now().timestamp_millis(), &random_suffix());
        let result = storage
            .put(PutObject {
                bucket: file.kind.bucket(buckets),
                key: &key,
                body: file.data.clone(),
                content_type: &file.content_type,
                upsert: false,
            })
            .await;

        match result {
            Ok(url) => match file.kind {
                MediaKind::Image => stored.image_urls.push(url),
                MediaKind::Audio => stored.audio_url = Some(url),
            },
            Err(e) => {
                discard(storage, &stored.urls()).await;
                return Err(e.into());
            }
        }
    }

    Ok(stored)
}

/// Store an avatar; avatars replace whatever is stored under the same key
pub async fn store_avatar(
    storage: &dyn ObjectStorage,
    buckets: &Buckets,
    owner: &str,
    file: &MediaFile,
) -> Result<String, UploadError> {
    let key = format!("{}/avatar.{}", key_segment(owner), extension(file));
    let url = storage
        .put(PutObject {
            bucket: &buckets.avatars,
            key: &key,
            body: file.data.clone(),
            content_type: &file.content_type,
            upsert: true,
        })
        .await?;
    Ok(url)
}

/// Best-effort removal of stored objects
pub async fn discard(storage: &dyn ObjectStorage, urls: &[String]) {
    for url in urls {
        let Some((bucket, key)) = storage.locate(url) else {
            warn!("Not removing {}: not a storage URL", url);
            continue;
        };
        if let Err(e) = storage.remove(&bucket, &key).await {
            warn!("Failed to remove {}/{}: {}", bucket, key, e);
        }
    }
}
