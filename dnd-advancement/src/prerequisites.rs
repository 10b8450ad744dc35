//! Feat prerequisite validation.
//!
//! Each prerequisite entry of a feat is checked on its own and every unmet
//! condition contributes a reason. Reasons from all entries are collected, so
//! a feat is only valid when every entry holds.

use crate::content::{FeatDefinition, PrerequisiteEntry};
use crate::world::Character;
use serde::{Deserialize, Serialize};

/// Outcome of checking a feat against a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteCheck {
    pub valid: bool,
    pub reasons: Vec<String>,
}

impl PrerequisiteCheck {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            valid: reasons.is_empty(),
            reasons,
        }
    }
}

/// Check whether `character` meets the prerequisites of `feat`.
pub fn check(feat: &FeatDefinition, character: &Character) -> PrerequisiteCheck {
    let reasons = feat
        .prerequisites
        .iter()
        .flat_map(|entry| unmet_conditions(entry, character))
        .collect();
    PrerequisiteCheck::from_reasons(reasons)
}

fn unmet_conditions(entry: &PrerequisiteEntry, character: &Character) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(level) = entry.level {
        if character.level < level {
            reasons.push(format!("Requires level {level}"));
        }
    }

    for (&ability, &minimum) in &entry.abilities {
        if character.ability_scores.get(ability) < minimum {
            reasons.push(format!("Requires {} {minimum}", ability.name()));
        }
    }

    if let Some(feature) = &entry.feature {
        if !character.has_feature(feature) {
            reasons.push(format!("Requires the {feature} feature"));
        }
    }

    if let Some(text) = &entry.other {
        if !other_condition_met(text, character) {
            reasons.push(format!("Requires: {text}"));
        }
    }

    reasons
}

/// Best-effort reading of a free-text condition.
///
/// Spellcasting conditions hold for any character that knows a spell or has
/// a Spellcasting/Pact Magic feature. Anything else holds when the text names
/// a feature or feat the character already has.
fn other_condition_met(text: &str, character: &Character) -> bool {
    let lowered = text.to_lowercase();

    if lowered.contains("spell") || lowered.contains("pact magic") {
        let knows_spells =
            !character.spells.cantrips.is_empty() || !character.spells.spells.is_empty();
        return knows_spells
            || character.has_feature("Spellcasting")
            || character.has_feature("Pact Magic");
    }

    character
        .features
        .iter()
        .map(|f| f.name.to_lowercase())
        .chain(character.feats.iter().map(|k| k.name.to_lowercase()))
        .any(|name| !name.is_empty() && lowered.contains(&name))
}
