//! Common library for the Pindrop application
//!
//! This crate provides the domain shared by the gateway and its clients:
//! entities and API payloads, coordinate and bounding-box handling, circle
//! access codes and the rules deciding which pins a user may see.

pub mod access_code;
pub mod error;
pub mod geo;
pub mod models;
pub mod validation;
pub mod visibility;

pub use error::{ValidationError, ValidationResult};
