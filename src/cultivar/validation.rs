//! Validation for cultivar profiles and reviews.

use super::models::{CultivarProfile, Range};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField {
        field: &'static str,
    },
    InvertedRange {
        field: String,
        min: f64,
        max: f64,
    },
    OutOfBounds {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    InvalidRating(i64),
    InvalidValue {
        field: String,
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::InvertedRange { field, min, max } => {
                write!(f, "Field '{}' has min {} greater than max {}", field, min, max)
            }
            ValidationError::OutOfBounds {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Field '{}' must be between {} and {}, got {}",
                field, min, max, value
            ),
            ValidationError::InvalidRating(rating) => {
                write!(f, "Rating must be between 1 and 5, got {}", rating)
            }
            ValidationError::InvalidValue { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn validate_range(field: &str, range: &Range) -> ValidationResult<()> {
    if let (Some(min), Some(max)) = (range.min, range.max) {
        if min > max {
            return Err(ValidationError::InvertedRange {
                field: field.to_string(),
                min,
                max,
            });
        }
    }
    Ok(())
}

fn validate_percentage(field: &str, range: &Range) -> ValidationResult<()> {
    validate_range(field, range)?;
    for value in [range.min, range.max].into_iter().flatten() {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::OutOfBounds {
                field: field.to_string(),
                value,
                min: 0.0,
                max: 100.0,
            });
        }
    }
    Ok(())
}

pub fn validate_profile(profile: &CultivarProfile) -> ValidationResult<()> {
    if profile.name.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "name" });
    }

    for (field, range) in profile.cannabinoids() {
        validate_percentage(field, range)?;
    }

    let plant = &profile.plant_characteristics;
    validate_percentage("plantCharacteristics.moisture", &plant.moisture)?;
    validate_range("plantCharacteristics.height", &plant.height)?;
    validate_range("plantCharacteristics.yieldPerPlant", &plant.yield_per_plant)?;
    validate_range("plantCharacteristics.yieldPerWatt", &plant.yield_per_watt)?;
    validate_range("plantCharacteristics.yieldPerM2", &plant.yield_per_m2)?;

    let pricing = Range::new(profile.pricing.min, profile.pricing.max);
    validate_range("pricing", &pricing)?;

    for image in &profile.images {
        if image.url.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "images.url" });
        }
    }
    Ok(())
}

/// Validate a review rating, returning it as stored.
pub fn validate_rating(rating: i64) -> ValidationResult<u8> {
    if (1..=5).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(ValidationError::InvalidRating(rating))
    }
}

pub fn validate_review_input(author: &str, experience: &str) -> ValidationResult<()> {
    if author.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "author" });
    }
    if experience.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "experience" });
    }
    Ok(())
}
