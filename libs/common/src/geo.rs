//! Coordinates, map viewports and bounding-box filtering
//!
//! Longitudes wrap: a [`BoundingBox`] whose `min_lng` is greater than its
//! `max_lng` spans the antimeridian.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::models::Pin;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> ValidationResult<Self> {
        Self {
            latitude,
            longitude,
        }
        .validated()
    }

    /// Check latitude in [-90, 90] and longitude in [-180, 180]
    pub fn validated(self) -> ValidationResult<Self> {
        validate_latitude(self.latitude)?;
        validate_longitude(self.longitude)?;
        Ok(self)
    }
}

pub fn validate_latitude(latitude: f64) -> ValidationResult<f64> {
    if latitude.is_finite() && (-90.0..=90.0).contains(&latitude) {
        Ok(latitude)
    } else {
        Err(ValidationError::Latitude(latitude))
    }
}

pub fn validate_longitude(longitude: f64) -> ValidationResult<f64> {
    if longitude.is_finite() && (-180.0..=180.0).contains(&longitude) {
        Ok(longitude)
    } else {
        Err(ValidationError::Longitude(longitude))
    }
}

/// Wrap any finite longitude into [-180, 180]
pub fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    let wrapped = (longitude + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && longitude > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// A visible map area, as reported by the map view: centre plus the span of
/// the viewport in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

/// Rectangular area on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> ValidationResult<Self> {
        validate_latitude(min_lat)?;
        validate_latitude(max_lat)?;
        validate_longitude(min_lng)?;
        validate_longitude(max_lng)?;
        if min_lat > max_lat {
            return Err(ValidationError::BoundingBox(format!(
                "min_lat {} is greater than max_lat {}",
                min_lat, max_lat
            )));
        }
        Ok(Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        })
    }

    /// Build the box covering a viewport region. Latitude is clamped to the
    /// poles; a longitude span of 360 degrees or more covers the whole globe.
    pub fn from_region(region: Region) -> ValidationResult<Self> {
        validate_latitude(region.latitude)?;
        if !region.longitude.is_finite() {
            return Err(ValidationError::Longitude(region.longitude));
        }
        if !(region.latitude_delta.is_finite() && region.longitude_delta.is_finite())
            || region.latitude_delta < 0.0
            || region.longitude_delta < 0.0
        {
            return Err(ValidationError::BoundingBox(
                "region deltas must be finite and non-negative".to_string(),
            ));
        }

        let half_lat = region.latitude_delta / 2.0;
        let min_lat = (region.latitude - half_lat).max(-90.0);
        let max_lat = (region.latitude + half_lat).min(90.0);

        if region.longitude_delta >= 360.0 {
            return Ok(Self {
                min_lat,
                min_lng: -180.0,
                max_lat,
                max_lng: 180.0,
            });
        }

        let half_lng = region.longitude_delta / 2.0;
        Ok(Self {
            min_lat,
            min_lng: wrap_longitude(region.longitude - half_lng),
            max_lat,
            max_lng: wrap_longitude(region.longitude + half_lng),
        })
    }

    /// True when the box crosses the antimeridian
    pub fn wraps(&self) -> bool {
        self.min_lng > self.max_lng
    }

    pub fn contains(&self, point: Coordinates) -> bool {
        if point.latitude < self.min_lat || point.latitude > self.max_lat {
            return false;
        }
        if self.wraps() {
            point.longitude >= self.min_lng || point.longitude <= self.max_lng
        } else {
            point.longitude >= self.min_lng && point.longitude <= self.max_lng
        }
    }

    /// Keep the pins located inside the box, preserving order
    pub fn filter_pins(&self, pins: Vec<Pin>) -> Vec<Pin> {
        pins.into_iter()
            .filter(|pin| self.contains(pin.coordinates()))
            .collect()
    }
}

/// Optional bounding box carried as query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lng: Option<f64>,
}

impl BoundsQuery {
    /// All four parameters or none; anything in between is rejected
    pub fn bounding_box(&self) -> ValidationResult<Option<BoundingBox>> {
        match (self.min_lat, self.min_lng, self.max_lat, self.max_lng) {
            (None, None, None, None) => Ok(None),
            (Some(min_lat), Some(min_lng), Some(max_lat), Some(max_lng)) => {
                BoundingBox::new(min_lat, min_lng, max_lat, max_lng).map(Some)
            }
            _ => Err(ValidationError::BoundingBox(
                "min_lat, min_lng, max_lat and max_lng must be given together".to_string(),
            )),
        }
    }
}

impl From<BoundingBox> for BoundsQuery {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            min_lat: Some(bbox.min_lat),
            min_lng: Some(bbox.min_lng),
            max_lat: Some(bbox.max_lat),
            max_lng: Some(bbox.max_lng),
        }
    }
}
