//! Multipart bodies for uploads

use common::{
    ValidationResult,
    geo::Coordinates,
    models::Visibility,
    validation::require_non_blank,
};
use reqwest::multipart::{Form, Part};
use uuid::Uuid;

use crate::error::ClientResult;

/// A file to upload
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    fn part(&self) -> ClientResult<Part> {
        Ok(Part::bytes(self.data.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.content_type)?)
    }
}

/// Everything needed to create a pin
#[derive(Debug, Clone)]
pub struct NewPinForm {
    pub name: String,
    pub description: Option<String>,
    pub coordinates: Coordinates,
    pub location_query: Option<String>,
    pub visibility: Visibility,
    pub social_circle_ids: Vec<Uuid>,
    pub images: Vec<MediaFile>,
    pub audio: Option<MediaFile>,
}

impl NewPinForm {
    pub fn new(name: impl Into<String>, coordinates: Coordinates, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            description: None,
            coordinates,
            location_query: None,
            visibility,
            social_circle_ids: Vec::new(),
            images: Vec::new(),
            audio: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn location_query(mut self, query: impl Into<String>) -> Self {
        self.location_query = Some(query.into());
        self
    }

    pub fn share_with(mut self, circle_id: Uuid) -> Self {
        self.social_circle_ids.push(circle_id);
        self
    }

    pub fn image(mut self, file: MediaFile) -> Self {
        self.images.push(file);
        self
    }

    pub fn audio(mut self, file: MediaFile) -> Self {
        self.audio = Some(file);
        self
    }

    /// Checks the gateway would also make
    pub fn validate(&self) -> ValidationResult<()> {
        require_non_blank(&self.name, "name")?;
        self.coordinates.validated()?;
        Ok(())
    }

    pub(crate) fn into_multipart(self) -> ClientResult<Form> {
        self.validate()?;

        let mut form = Form::new()
            .text("name", self.name)
            .text("latitude", self.coordinates.latitude.to_string())
            .text("longitude", self.coordinates.longitude.to_string())
            .text("visibility", self.visibility.as_str());
        if let Some(description) = self.description {
            form = form.text("description", description);
        }
        if let Some(query) = self.location_query {
            form = form.text("location_query", query);
        }
        if !self.social_circle_ids.is_empty() {
            form = form.text(
                "social_circle_ids",
                serde_json::to_string(&self.social_circle_ids).unwrap_or_default(),
            );
        }
        for image in &self.images {
            form = form.part("image", image.part()?);
        }
        if let Some(audio) = &self.audio {
            form = form.part("audio", audio.part()?);
        }
        Ok(form)
    }
}

/// Body of an avatar upload
pub(crate) fn avatar_form(file: &MediaFile) -> ClientResult<Form> {
    Ok(Form::new().part("image", file.part()?))
}
