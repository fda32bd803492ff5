// src/preferences/model.rs - Dining preference record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default score for every rating criterion.
pub const DEFAULT_RATING: f64 = 2.5;

/// Default value for every free-text field.
pub const DEFAULT_TEXT: &str = "none";

/// Named criteria the user scores from 0.0 to 5.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatingKey {
    ValueForMoney,
    Hygiene,
    Environment,
    Distance,
    WaitTime,
    PlatformRating,
    Service,
    Taste,
    Health,
    Nutrition,
    Spiciness,
}

impl RatingKey {
    pub const ALL: [RatingKey; 11] = [
        RatingKey::ValueForMoney,
        RatingKey::Hygiene,
        RatingKey::Environment,
        RatingKey::Distance,
        RatingKey::WaitTime,
        RatingKey::PlatformRating,
        RatingKey::Service,
        RatingKey::Taste,
        RatingKey::Health,
        RatingKey::Nutrition,
        RatingKey::Spiciness,
    ];

    /// Serialized (camelCase) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingKey::ValueForMoney => "valueForMoney",
            RatingKey::Hygiene => "hygiene",
            RatingKey::Environment => "environment",
            RatingKey::Distance => "distance",
            RatingKey::WaitTime => "waitTime",
            RatingKey::PlatformRating => "platformRating",
            RatingKey::Service => "service",
            RatingKey::Taste => "taste",
            RatingKey::Health => "health",
            RatingKey::Nutrition => "nutrition",
            RatingKey::Spiciness => "spiciness",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RatingKey::ValueForMoney => "Value for money",
            RatingKey::Hygiene => "Hygiene",
            RatingKey::Environment => "Environment",
            RatingKey::Distance => "Distance",
            RatingKey::WaitTime => "Wait time",
            RatingKey::PlatformRating => "Platform rating",
            RatingKey::Service => "Service",
            RatingKey::Taste => "Taste",
            RatingKey::Health => "Health",
            RatingKey::Nutrition => "Nutrition",
            RatingKey::Spiciness => "Spiciness",
        }
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the camelCase name or a kebab/snake-case spelling
/// (`value-for-money`, `wait_time`), case-insensitively.
impl FromStr for RatingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        RatingKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("unknown rating criterion '{s}'"))
    }
}

/// Free-text preference fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferenceField {
    Allergies,
    Likes,
    Dislikes,
}

impl PreferenceField {
    pub const ALL: [PreferenceField; 3] = [
        PreferenceField::Allergies,
        PreferenceField::Likes,
        PreferenceField::Dislikes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceField::Allergies => "allergies",
            PreferenceField::Likes => "likes",
            PreferenceField::Dislikes => "dislikes",
        }
    }
}

impl fmt::Display for PreferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slider positions (0..=100), not currency. See [`super::price`] for the
/// position to price mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u8,
    pub max: u8,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self { min: 0, max: 100 }
    }
}

/// The whole preference record, serialized wholesale when staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceRecord {
    pub price_range: PriceRange,
    pub ratings: BTreeMap<RatingKey, f64>,
    /// Free-text fields; serialized under `preferences`.
    pub preferences: BTreeMap<PreferenceField, String>,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            price_range: PriceRange::default(),
            ratings: RatingKey::ALL
                .iter()
                .map(|k| (*k, DEFAULT_RATING))
                .collect(),
            preferences: PreferenceField::ALL
                .iter()
                .map(|f| (*f, DEFAULT_TEXT.to_string()))
                .collect(),
        }
    }
}

impl PreferenceRecord {
    pub fn rating(&self, key: RatingKey) -> f64 {
        self.ratings.get(&key).copied().unwrap_or(DEFAULT_RATING)
    }

    pub fn text(&self, field: PreferenceField) -> &str {
        self.preferences
            .get(&field)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEXT)
    }
}
