// src/chat/persona.rs - Assistant persona and preference-aware system prompt

use crate::preferences::price::position_to_price;
use crate::preferences::{PreferenceField, PreferenceRecord, RatingKey};

/// Fixed persona shared by the direct path and the backend chatbot.
pub const SYSTEM_PROMPT: &str = "You are the food assistant of Caigentan, a campus dining guide \
for Nanjing University. You recommend restaurants and dishes around the Gulou campus. \
Ask about the user's budget and taste when they have not said, keep recommendations concrete \
(restaurant, dish, rough price, why it fits), and stay friendly and professional. \
If a question is unrelated to food or dining, steer the conversation back politely.";

/// Build the system prompt, appending the user's staged preferences when known.
///
/// Sections (in order):
///   1. Persona
///   2. Budget (from the price slider positions)
///   3. Criteria the user weighs, highest first
///   4. Allergies, likes, dislikes
pub fn build_system_prompt(preferences: Option<&PreferenceRecord>) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(SYSTEM_PROMPT);
    prompt.push_str("\n\n");

    if let Some(prefs) = preferences {
        append_preferences_section(&mut prompt, prefs);
    }

    prompt
}

fn append_preferences_section(prompt: &mut String, prefs: &PreferenceRecord) {
    prompt.push_str("# User preferences\n\n");

    let min = position_to_price(prefs.price_range.min);
    let max = position_to_price(prefs.price_range.max);
    prompt.push_str(&format!("- Budget per person: {min} to {max}\n"));

    // Scores are 0.0..=5.0; list the ones the user cares about most first.
    let mut ratings: Vec<(RatingKey, f64)> =
        RatingKey::ALL.iter().map(|k| (*k, prefs.rating(*k))).collect();
    ratings.sort_by(|a, b| b.1.total_cmp(&a.1));
    let weighted: Vec<String> = ratings
        .iter()
        .map(|(k, v)| format!("{} {v:.1}/5", k.label().to_lowercase()))
        .collect();
    prompt.push_str(&format!("- Importance of criteria: {}\n", weighted.join(", ")));

    for field in PreferenceField::ALL {
        let text = prefs.text(field).trim();
        if !text.is_empty() {
            prompt.push_str(&format!("- {}: {}\n", capitalize(field.as_str()), text));
        }
    }
    prompt.push_str(
        "\nNever recommend dishes that conflict with the allergies above. \
         Weigh recommendations by the criteria scores.\n\n",
    );
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
