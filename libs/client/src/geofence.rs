//! Viewport filtering for map screens

pub use common::geo::{BoundingBox, Coordinates, Region};

use common::{ValidationResult, models::Pin};

/// Pins located inside the visible region
pub fn pins_in_region(pins: Vec<Pin>, region: Region) -> ValidationResult<Vec<Pin>> {
    Ok(BoundingBox::from_region(region)?.filter_pins(pins))
}
