/// Shared data structures for the card catalog
///
/// These structs represent the data model that flows between
/// the store layer and the two controllers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which face of a card a record describes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    /// Parse from the wire form. Anything but "front"/"back" is rejected.
    pub fn parse(s: &str) -> Option<Side> {
        match s.trim() {
            "front" => Some(Side::Front),
            "back" => Some(Side::Back),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One card face as stored in the record store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CardRecord {
    /// Opaque store-assigned identifier, immutable for the record's lifetime
    pub id: String,
    /// Logical card series this face belongs to
    pub category: String,
    pub side: Side,
    /// Position within the category; (category, order) is the pairing key
    pub order: f64,
    /// Blob store path for the PNG bytes; empty while an upload is in flight
    pub storage_path: String,
    /// Soft-delete marker; flagged records are excluded from every view
    pub deleted: bool,
    /// Server-assigned, epoch milliseconds
    pub created_at: i64,
    pub updated_at: i64,
}

impl CardRecord {
    /// True once the create flow has linked the uploaded blob back
    /// onto the document. Incomplete records render as placeholders.
    pub fn is_path_linked(&self) -> bool {
        !self.storage_path.is_empty()
    }
}

/// A derived front/back grouping keyed by (category, order).
/// Never persisted; recomputed from the mirror on every render.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPair {
    pub category: String,
    pub order: f64,
    pub front: Option<CardRecord>,
    pub back: Option<CardRecord>,
}

impl CardPair {
    /// Placeholder label for an empty or incomplete slot ("NO FRONT").
    pub fn placeholder_label(side: Side) -> String {
        format!("NO {}", side.as_str().to_uppercase())
    }
}

/// Field validation failures, in the order the fields are checked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("category must not be empty")]
    EmptyCategory,
    #[error("side must be front or back")]
    InvalidSide,
    #[error("order must be a finite number")]
    NonFiniteOrder,
    #[error("an image file is required")]
    MissingImage,
}

/// Validate the editable metadata fields shared by create and update.
///
/// Checks category, then side, then order; the first violation aborts
/// before any store contact. Returns the trimmed category and parsed side.
pub fn validate_fields(
    category: &str,
    side: &str,
    order: f64,
) -> Result<(String, Side), ValidationError> {
    let category = category.trim();
    if category.is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    let side = Side::parse(side).ok_or(ValidationError::InvalidSide)?;
    if !order.is_finite() {
        return Err(ValidationError::NonFiniteOrder);
    }
    Ok((category.to_string(), side))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("front"), Some(Side::Front));
        assert_eq!(Side::parse(" back "), Some(Side::Back));
        assert_eq!(Side::parse("FRONT"), None);
        assert_eq!(Side::parse(""), None);
    }

    #[test]
    fn test_validation_precedence() {
        // Category is checked first even when everything is wrong
        assert_eq!(
            validate_fields("  ", "sideways", f64::NAN),
            Err(ValidationError::EmptyCategory)
        );
        assert_eq!(
            validate_fields("A", "sideways", f64::NAN),
            Err(ValidationError::InvalidSide)
        );
        assert_eq!(
            validate_fields("A", "front", f64::INFINITY),
            Err(ValidationError::NonFiniteOrder)
        );
        assert_eq!(
            validate_fields("A", "front", f64::NAN),
            Err(ValidationError::NonFiniteOrder)
        );
    }

    #[test]
    fn test_validation_trims_category() {
        let (category, side) = validate_fields(" Dragons ", "back", 2.0).unwrap();
        assert_eq!(category, "Dragons");
        assert_eq!(side, Side::Back);
    }

    #[test]
    fn test_placeholder_label() {
        assert_eq!(CardPair::placeholder_label(Side::Front), "NO FRONT");
        assert_eq!(CardPair::placeholder_label(Side::Back), "NO BACK");
    }
}
