//! Shared recommendation models
//!
//! Wire shapes exchanged with the ranking service. All payloads are camelCase JSON.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept when fingerprinting a location into a boot key
pub const BOOT_KEY_PRECISION: usize = 5;

/// Coordinate pair a session is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Create a validated location
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let location = Self {
            latitude,
            longitude,
        };
        location.validate()?;
        Ok(location)
    }

    /// Reject non-finite or out-of-range coordinates
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidInput(format!(
                "Latitude out of range: {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidInput(format!(
                "Longitude out of range: {}",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Rounded fingerprint used to make session boot idempotent
    pub fn boot_key(&self) -> BootKey {
        BootKey(format!(
            "{:.prec$},{:.prec$}",
            self.latitude,
            self.longitude,
            prec = BOOT_KEY_PRECISION
        ))
    }
}

/// Idempotency fingerprint of a location snapshot
///
/// Two locations that round to the same value share a boot key, so a
/// re-entrant initialization for the same place never creates a second session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BootKey(String);

impl BootKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Swipe action reported for the current candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedbackAction {
    Like,
    Pass,
    SuperStar,
}

impl FeedbackAction {
    /// Wire name of the action
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::Like => "LIKE",
            FeedbackAction::Pass => "PASS",
            FeedbackAction::SuperStar => "SUPERSTAR",
        }
    }
}

impl fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recommendable item returned by the ranking service
///
/// Immutable once received; the client only references candidates, never edits them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Unique candidate identifier
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub address: Option<String>,

    /// Distance from the session location in kilometres (filled by the service)
    #[serde(default, alias = "distance")]
    pub distance_km: Option<f64>,

    /// Price level 0..=4, `None` when unknown
    #[serde(default)]
    pub price_level: Option<u8>,

    #[serde(default)]
    pub photo_url: Option<String>,

    #[serde(default)]
    pub primary_type: Option<String>,

    #[serde(default)]
    pub types: Vec<String>,

    /// Short editorial summary
    #[serde(default, alias = "description")]
    pub summary: Option<String>,

    // Amenity flags; absent means unknown
    #[serde(default)]
    pub dine_in: Option<bool>,
    #[serde(default)]
    pub takeout: Option<bool>,
    #[serde(default)]
    pub delivery: Option<bool>,
    #[serde(default)]
    pub reservable: Option<bool>,
    #[serde(default)]
    pub outdoor_seating: Option<bool>,
    #[serde(default)]
    pub serves_vegetarian_food: Option<bool>,
    #[serde(default)]
    pub good_for_groups: Option<bool>,
}

impl Candidate {
    /// Create a candidate with only an id and a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Price level clamped to the 0..=4 scale
    pub fn price_level(&self) -> Option<u8> {
        self.price_level.map(|level| level.min(4))
    }

    /// Budget rendering used by text front-ends ("★★☆☆")
    pub fn budget_stars(&self) -> String {
        let level = self.price_level().unwrap_or(0) as usize;
        format!("{}{}", "★".repeat(level), "☆".repeat(4 - level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_key_rounds_to_five_decimals() {
        let a = Location::new(40.4237051, -86.9211951).unwrap();
        let b = Location::new(40.4237098, -86.9211998).unwrap();

        assert_eq!(a.boot_key().as_str(), "40.42371,-86.92120");
        assert_eq!(a.boot_key(), b.boot_key(), "Sub-precision jitter must not change the key");
    }

    #[test]
    fn test_boot_key_changes_with_location() {
        let a = Location::new(40.42370, -86.92120).unwrap();
        let b = Location::new(40.42380, -86.92120).unwrap();
        assert_ne!(a.boot_key(), b.boot_key());
    }

    #[test]
    fn test_location_rejects_out_of_range() {
        assert!(Location::new(91.0, 0.0).is_err());
        assert!(Location::new(0.0, -181.0).is_err());
        assert!(Location::new(f64::NAN, 0.0).is_err());
        assert!(Location::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_feedback_action_wire_names() {
        assert_eq!(serde_json::to_string(&FeedbackAction::Like).unwrap(), "\"LIKE\"");
        assert_eq!(serde_json::to_string(&FeedbackAction::Pass).unwrap(), "\"PASS\"");
        assert_eq!(
            serde_json::to_string(&FeedbackAction::SuperStar).unwrap(),
            "\"SUPERSTAR\""
        );
        assert_eq!(FeedbackAction::SuperStar.to_string(), "SUPERSTAR");
    }

    #[test]
    fn test_candidate_accepts_legacy_field_names() {
        // Older service builds send `distance` and `description`
        let json = r#"{
            "id": "r1",
            "name": "Taco Place",
            "distance": 1.25,
            "description": "Street tacos",
            "priceLevel": 2,
            "types": ["restaurant", "mexican_restaurant"],
            "dineIn": true
        }"#;

        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.distance_km, Some(1.25));
        assert_eq!(candidate.summary.as_deref(), Some("Street tacos"));
        assert_eq!(candidate.dine_in, Some(true));
        assert_eq!(candidate.takeout, None);
        assert_eq!(candidate.budget_stars(), "★★☆☆");
    }

    #[test]
    fn test_candidate_minimal_payload() {
        let candidate: Candidate = serde_json::from_str(r#"{"id":"x","name":"X"}"#).unwrap();
        assert_eq!(candidate, Candidate::new("x", "X"));
        assert_eq!(candidate.budget_stars(), "☆☆☆☆");
    }

    #[test]
    fn test_price_level_clamped() {
        let mut candidate = Candidate::new("x", "X");
        candidate.price_level = Some(9);
        assert_eq!(candidate.price_level(), Some(4));
    }
}
