// src/cli/prefs.rs - `caigentan prefs`: edit, stage and upload preferences

use anyhow::{bail, Context};

use super::PrefsArgs;
use crate::chat::HttpChatBackend;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::preferences::price::position_to_price;
use crate::preferences::{
    snap_rating, FileKeyValueStore, KeyValueStore, PreferenceField, PreferenceRecord,
    PreferenceStore, RatingKey,
};

pub async fn run_prefs(args: PrefsArgs, config: &Config) -> anyhow::Result<()> {
    paths::ensure_dirs().await?;
    let path = paths::local_storage_path();

    // Start from the staged record so edits accumulate across invocations.
    let staged = PreferenceStore::new(FileKeyValueStore::new(path.clone()))
        .load_staged()
        .context("reading staged preferences")?;
    let mut store =
        PreferenceStore::with_record(FileKeyValueStore::new(path.clone()), staged.unwrap_or_default());

    let changed = apply_edits(&mut store, &args)?;
    if changed {
        store.save_preferences()?;
        eprintln!("Preferences saved to {}", path.display());
    }

    if args.show || !(changed || args.upload) {
        print!("{}", render(store.preferences()));
    }

    if args.upload {
        let url = args
            .backend
            .clone()
            .unwrap_or_else(|| config.chat.backend_url.clone());
        HttpChatBackend::new(url)
            .upload_preferences(store.preferences())
            .await
            .context("uploading preferences")?;
        eprintln!("Preferences uploaded.");
    }
    Ok(())
}

/// Apply every edit in `args`. Returns whether anything changed.
pub fn apply_edits<S: KeyValueStore>(
    store: &mut PreferenceStore<S>,
    args: &PrefsArgs,
) -> anyhow::Result<bool> {
    let mut changed = false;

    if let Some(range) = &args.price {
        let (min, max) = parse_price_range(range)?;
        store.update_price_range(min, max);
        changed = true;
    }

    for entry in &args.ratings {
        let (key, value) = parse_rating(entry)?;
        store.update_rating(key, value);
        changed = true;
    }

    let texts = [
        (PreferenceField::Allergies, &args.allergies),
        (PreferenceField::Likes, &args.likes),
        (PreferenceField::Dislikes, &args.dislikes),
    ];
    for (field, text) in texts {
        if let Some(text) = text {
            store.update_preference(field, text.clone());
            changed = true;
        }
    }

    Ok(changed)
}

/// `MIN-MAX` slider positions, both in 0..=100 with `min <= max`.
pub fn parse_price_range(s: &str) -> anyhow::Result<(u8, u8)> {
    let Some((min, max)) = s.split_once('-') else {
        bail!("price range must look like MIN-MAX, got '{s}'");
    };
    let min: u8 = min.trim().parse().with_context(|| format!("bad minimum '{min}'"))?;
    let max: u8 = max.trim().parse().with_context(|| format!("bad maximum '{max}'"))?;
    if max > 100 {
        bail!("price positions go from 0 to 100, got {max}");
    }
    if min > max {
        bail!("minimum {min} is above maximum {max}");
    }
    Ok((min, max))
}

/// `KEY=VALUE`, value snapped to the nearest half step.
pub fn parse_rating(s: &str) -> anyhow::Result<(RatingKey, f64)> {
    let Some((key, value)) = s.split_once('=') else {
        bail!("rating must look like KEY=VALUE, got '{s}'");
    };
    let key: RatingKey = key.trim().parse().map_err(anyhow::Error::msg)?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("bad rating value '{value}'"))?;
    if !value.is_finite() {
        bail!("rating value must be a number");
    }
    Ok((key, snap_rating(value)))
}

pub fn render(record: &PreferenceRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Budget: {} to {} (slider {}-{})\n",
        position_to_price(record.price_range.min),
        position_to_price(record.price_range.max),
        record.price_range.min,
        record.price_range.max,
    ));
    out.push_str("Ratings:\n");
    for key in RatingKey::ALL {
        out.push_str(&format!("  {:<16} {:.1}\n", key.label(), record.rating(key)));
    }
    for field in PreferenceField::ALL {
        out.push_str(&format!("{:<10} {}\n", format!("{}:", field.as_str()), record.text(field)));
    }
    out
}
