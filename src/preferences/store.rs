// src/preferences/store.rs - In-memory preference store with explicit staging

use super::model::{PreferenceField, PreferenceRecord, PriceRange, RatingKey};
use super::storage::KeyValueStore;
use crate::infra::errors::CaigentanError;

/// Key the record is staged under.
pub const PREFERENCES_KEY: &str = "userPreferences";

/// The eleven allowed rating values, 0.0 to 5.0 in half steps.
pub const RATING_STEPS: [f64; 11] = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0];

/// Snap `value` to the nearest entry of [`RATING_STEPS`]. Ties go to the
/// lower step.
pub fn snap_rating(value: f64) -> f64 {
    let mut best = RATING_STEPS[0];
    let mut best_dist = (value - best).abs();
    for step in RATING_STEPS.iter().skip(1) {
        let dist = (value - step).abs();
        if dist < best_dist {
            best = *step;
            best_dist = dist;
        }
    }
    best
}

/// Holds the session's single [`PreferenceRecord`].
///
/// Mutations only touch memory. Nothing reaches durable storage until
/// [`PreferenceStore::save_preferences`] is called, so the staged copy may lag
/// behind the in-memory record.
pub struct PreferenceStore<S: KeyValueStore> {
    record: PreferenceRecord,
    storage: S,
}

impl<S: KeyValueStore> PreferenceStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_record(storage, PreferenceRecord::default())
    }

    pub fn with_record(storage: S, record: PreferenceRecord) -> Self {
        Self { record, storage }
    }

    /// Full in-memory snapshot.
    pub fn preferences(&self) -> &PreferenceRecord {
        &self.record
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Verbatim replace. The slider guarantees 0..=100 and `min <= max`.
    pub fn update_price_range(&mut self, min: u8, max: u8) {
        self.record.price_range = PriceRange { min, max };
    }

    /// Verbatim replace; callers quantize with [`snap_rating`] first.
    /// Non-finite values are accepted here but refused by
    /// [`PreferenceStore::save_preferences`].
    pub fn update_rating(&mut self, key: RatingKey, value: f64) {
        self.record.ratings.insert(key, value);
    }

    pub fn update_preference(&mut self, key: PreferenceField, text: impl Into<String>) {
        self.record.preferences.insert(key, text.into());
    }

    /// Serialize the whole record into the durable slot, overwriting it.
    /// Fails without writing if any rating is NaN or infinite (JSON has no
    /// such numbers).
    pub fn save_preferences(&mut self) -> Result<(), CaigentanError> {
        if let Some((key, value)) = self.record.ratings.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CaigentanError::PreferenceSaveFailed(format!(
                "rating '{key}' is not a finite number ({value})"
            )));
        }
        let json = serde_json::to_string(&self.record)
            .map_err(|e| CaigentanError::PreferenceSaveFailed(e.to_string()))?;
        self.storage
            .set_item(PREFERENCES_KEY, &json)
            .map_err(|e| CaigentanError::PreferenceSaveFailed(e.to_string()))?;
        tracing::info!(bytes = json.len(), "Preferences staged");
        Ok(())
    }

    /// Read back the staged record, if any. Never called implicitly.
    pub fn load_staged(&self) -> Result<Option<PreferenceRecord>, CaigentanError> {
        match self.storage.get_item(PREFERENCES_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
