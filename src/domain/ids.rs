//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for the identifiers that flow
//! through the migration engine. Each type ensures type safety and provides
//! validation for format compliance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The monotonic numeric key bounding fetch/resume progress.
///
/// Offsets are unique per family and strictly increasing in the source store.
pub type Offset = i64;

/// Record family identifier newtype wrapper
///
/// A family is one class of source record (one craft/process type) with its
/// own decoder variant, source tables and checkpoint file. Family names label
/// checkpoints and are written into every normalized row as the craft type,
/// so they are restricted to lowercase identifiers.
///
/// # Examples
///
/// ```
/// use anvil::domain::ids::Family;
/// use std::str::FromStr;
///
/// let family = Family::from_str("fastening").unwrap();
/// assert_eq!(family.as_str(), "fastening");
/// assert!(Family::from_str("Not A Name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Family(String);

impl Family {
    /// Creates a new Family from a string
    ///
    /// # Arguments
    ///
    /// * `name` - The family name; lowercase ASCII letters, digits,
    ///   underscores and dashes only
    ///
    /// # Returns
    ///
    /// Returns `Ok(Family)` if the name is valid, `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Family name cannot be empty".to_string());
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(format!(
                "Invalid family name '{name}': only lowercase letters, digits, '_' and '-' are allowed"
            ));
        }
        Ok(Self(name))
    }

    /// Returns the family name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value written into the normalized schema's craft_type columns.
    ///
    /// Stored upper-cased so the business schema matches the legacy
    /// convention for craft labels.
    pub fn craft_label(&self) -> String {
        self.0.to_ascii_uppercase()
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Family {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_valid() {
        let family = Family::new("riveting").unwrap();
        assert_eq!(family.as_str(), "riveting");
        assert_eq!(family.to_string(), "riveting");
    }

    #[test]
    fn test_family_craft_label() {
        let family = Family::new("fastening").unwrap();
        assert_eq!(family.craft_label(), "FASTENING");
    }

    #[test]
    fn test_family_rejects_empty() {
        assert!(Family::new("").is_err());
        assert!(Family::new("   ").is_err());
    }

    #[test]
    fn test_family_rejects_invalid_chars() {
        assert!(Family::new("Fastening").is_err());
        assert!(Family::new("fas tening").is_err());
        assert!(Family::new("fas/tening").is_err());
    }

    #[test]
    fn test_family_from_str() {
        let family: Family = "spot_weld-2".parse().unwrap();
        assert_eq!(family.as_str(), "spot_weld-2");
    }

    #[test]
    fn test_family_serde_roundtrip() {
        let family = Family::new("riveting").unwrap();
        let json = serde_json::to_string(&family).unwrap();
        assert_eq!(json, "\"riveting\"");
        let back: Family = serde_json::from_str(&json).unwrap();
        assert_eq!(back, family);
    }
}
